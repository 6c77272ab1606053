//! Standard algebraic notation rendering: piece letter, minimal
//! disambiguation, capture marker, promotion suffix and '+'/'#'.

use crate::board::{Board, PieceKind};
use crate::moves::types::Move;

fn piece_letter(kind: PieceKind) -> Option<char> {
    match kind {
        PieceKind::Pawn => None,
        PieceKind::Knight => Some('N'),
        PieceKind::Bishop => Some('B'),
        PieceKind::Rook => Some('R'),
        PieceKind::Queen => Some('Q'),
        PieceKind::King => Some('K'),
    }
}

impl Board {
    /// Render a legal move in SAN. Disambiguates by file, rank or both when
    /// several same-kind pieces reach the destination.
    pub fn san(&self, mv: Move) -> String {
        let mut san = String::new();

        if mv.is_kingside_castle() {
            san.push_str("O-O");
        } else if mv.is_queenside_castle() {
            san.push_str("O-O-O");
        } else {
            let kind = self
                .piece_kind_at(mv.origin())
                .unwrap_or(PieceKind::Pawn);

            if let Some(letter) = piece_letter(kind) {
                san.push(letter);

                let (needs_file, needs_rank) = self.disambiguation(mv, kind);
                if needs_file {
                    san.push((b'a' + mv.origin().file()) as char);
                }
                if needs_rank {
                    san.push((b'1' + mv.origin().rank()) as char);
                }
            } else if mv.is_capture() {
                // Pawn captures name the origin file.
                san.push((b'a' + mv.origin().file()) as char);
            }

            if mv.is_capture() {
                san.push('x');
            }

            san.push_str(&mv.destination().to_string());

            if let Some(promo) = mv.promotion_kind() {
                san.push('=');
                if let Some(letter) = piece_letter(promo) {
                    san.push(letter);
                }
            }
        }

        // Probe the resulting position for check and mate.
        let mut probe = self.clone();
        probe.make_move(mv);
        if probe.is_check() {
            if probe.legal_moves().is_empty() {
                san.push('#');
            } else {
                san.push('+');
            }
        }

        san
    }

    /// (needs file, needs rank) to make the origin unique among same-kind
    /// pieces that can also reach the destination.
    fn disambiguation(&self, mv: Move, kind: PieceKind) -> (bool, bool) {
        let rivals: Vec<Move> = self
            .legal_moves()
            .iter()
            .filter(|m| {
                m.destination() == mv.destination()
                    && m.origin() != mv.origin()
                    && self.piece_kind_at(m.origin()) == Some(kind)
            })
            .copied()
            .collect();

        if rivals.is_empty() {
            return (false, false);
        }

        let same_file = rivals
            .iter()
            .any(|m| m.origin().file() == mv.origin().file());
        let same_rank = rivals
            .iter()
            .any(|m| m.origin().rank() == mv.origin().rank());

        match (same_file, same_rank) {
            (false, _) => (true, false),
            (true, false) => (false, true),
            (true, true) => (true, true),
        }
    }

    /// Render a whole line in SAN, playing the moves out on a scratch copy.
    pub fn san_variation(&self, moves: &[Move]) -> Vec<String> {
        let mut probe = self.clone();
        let mut out = Vec::with_capacity(moves.len());
        for &mv in moves {
            out.push(probe.san(mv));
            probe.make_move(mv);
        }
        out
    }
}
