// O(1) FEN glyph <-> (kind, color) maps.

use super::{Color, PieceKind};

pub(super) const CHAR_TO_PC: [Option<(PieceKind, Color)>; 128] = {
    let mut table: [Option<(PieceKind, Color)>; 128] = [None; 128];

    // Uppercase = White
    table['P' as usize] = Some((PieceKind::Pawn, Color::White));
    table['N' as usize] = Some((PieceKind::Knight, Color::White));
    table['B' as usize] = Some((PieceKind::Bishop, Color::White));
    table['R' as usize] = Some((PieceKind::Rook, Color::White));
    table['Q' as usize] = Some((PieceKind::Queen, Color::White));
    table['K' as usize] = Some((PieceKind::King, Color::White));

    // Lowercase = Black
    table['p' as usize] = Some((PieceKind::Pawn, Color::Black));
    table['n' as usize] = Some((PieceKind::Knight, Color::Black));
    table['b' as usize] = Some((PieceKind::Bishop, Color::Black));
    table['r' as usize] = Some((PieceKind::Rook, Color::Black));
    table['q' as usize] = Some((PieceKind::Queen, Color::Black));
    table['k' as usize] = Some((PieceKind::King, Color::Black));

    table
};

const fn pc_index(kind: PieceKind, color: Color) -> usize {
    (color as usize) * 6 + (kind as usize)
}

pub(super) const PC_TO_CHAR: [char; 12] = {
    let mut t = ['\0'; 12];
    t[pc_index(PieceKind::Pawn, Color::White)] = 'P';
    t[pc_index(PieceKind::Knight, Color::White)] = 'N';
    t[pc_index(PieceKind::Bishop, Color::White)] = 'B';
    t[pc_index(PieceKind::Rook, Color::White)] = 'R';
    t[pc_index(PieceKind::Queen, Color::White)] = 'Q';
    t[pc_index(PieceKind::King, Color::White)] = 'K';
    t[pc_index(PieceKind::Pawn, Color::Black)] = 'p';
    t[pc_index(PieceKind::Knight, Color::Black)] = 'n';
    t[pc_index(PieceKind::Bishop, Color::Black)] = 'b';
    t[pc_index(PieceKind::Rook, Color::Black)] = 'r';
    t[pc_index(PieceKind::Queen, Color::Black)] = 'q';
    t[pc_index(PieceKind::King, Color::Black)] = 'k';
    t
};

pub(super) fn piece_char(kind: PieceKind, color: Color) -> char {
    PC_TO_CHAR[pc_index(kind, color)]
}
