//! The handcrafted evaluator: tapered material, piece-square tables, pawn
//! structure (cached), king safety, safe-square mobility, positional terms
//! and endgame rescoring. Scores are built from White's view and flipped to
//! the side to move at the end.

use crate::bitboard::BitboardExt;
use crate::board::{Board, Color, PieceKind, ALL_KINDS};
use crate::eval::endgame;
use crate::eval::masks;
use crate::eval::pst;
use crate::eval::Evaluator;
use crate::moves::magic;
use crate::moves::tables;
use crate::square::Square;
use crate::utils::BitIter;

// Material, middlegame / endgame (pawn..queen).
const MG_PIECE_VALUE: [i32; 5] = [110, 350, 360, 520, 980];
const EG_PIECE_VALUE: [i32; 5] = [150, 350, 370, 530, 1010];

// Knights like closed boards, rooks like open ones.
const KNIGHT_PAWN_BONUS: i32 = 2;
const ROOK_CAPTURED_PAWN_BONUS: i32 = 3;

const MG_BISHOP_PAIR: i32 = 30;
const EG_BISHOP_PAIR: i32 = 35;

// Pawn structure.
const MG_PAWN_DOUBLED: i32 = -12;
const EG_PAWN_DOUBLED: i32 = -20;
const MG_PAWN_ISOLATED: i32 = -12;
const EG_PAWN_ISOLATED: i32 = -14;
const MG_PAWN_BACKWARD: i32 = -8;
const EG_PAWN_BACKWARD: i32 = -10;
const MG_PAWN_CONNECTED: i32 = 5;
const EG_PAWN_CONNECTED: i32 = 3;
const MG_PAWN_CHAIN: i32 = 10;
const EG_PAWN_CHAIN: i32 = 5;
const MG_PAWN_PASSED_BASE: i32 = 7;
const EG_PAWN_PASSED_BASE: i32 = 18;
const MG_PAWN_PASSED_RANK_MULT: i32 = 2;
const EG_PAWN_PASSED_RANK_MULT: i32 = 9;
const MG_PASSED_PROTECTION: i32 = 7;
const EG_PASSED_PROTECTION: i32 = 32;
const MG_PAWN_ISLAND: i32 = -4;
const EG_PAWN_ISLAND: i32 = -6;

// King safety (middlegame only).
const MG_PAWN_SHIELD: i32 = 21;
const MG_PAWN_STORM_BASE: i32 = 2;
const MG_PAWN_STORM_RANK_MULT: i32 = 10;
const MG_KING_OPEN_FILE: i32 = -20;
const MG_KING_SEMI_OPEN_NEIGHBOR: i32 = -10;

const KING_ZONE_KNIGHT_WEIGHT: i32 = 2;
const KING_ZONE_BISHOP_WEIGHT: i32 = 2;
const KING_ZONE_ROOK_WEIGHT: i32 = 3;
const KING_ZONE_QUEEN_WEIGHT: i32 = 5;

#[rustfmt::skip]
const KING_SAFETY_TABLE: [i32; 100] = [
      0,   0,   1,   2,   3,   5,   7,   9,  12,  15,
     18,  22,  26,  30,  35,  39,  44,  50,  56,  62,
     68,  75,  82,  85,  89,  97, 105, 113, 122, 131,
    140, 150, 169, 180, 191, 202, 213, 225, 237, 248,
    260, 272, 283, 295, 307, 319, 330, 342, 354, 366,
    377, 389, 401, 412, 424, 436, 448, 459, 471, 483,
    494, 500, 500, 500, 500, 500, 500, 500, 500, 500,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500,
];

// Mobility weights per safe square.
const MG_MOBILITY: [i32; 4] = [2, 4, 4, 0]; // N, B, R, Q
const EG_MOBILITY: [i32; 4] = [1, 2, 3, 0];

// Positional.
const MG_ROOK_OPEN_FILE: i32 = 30;
const EG_ROOK_OPEN_FILE: i32 = 15;
const MG_ROOK_SEMI_OPEN_FILE: i32 = 15;
const EG_ROOK_SEMI_OPEN_FILE: i32 = 10;
const EG_ROOK_BEHIND_PASSER: i32 = 35;
const MG_BLOCKED_PASSER: i32 = -25;
const EG_BLOCKED_PASSER: i32 = -50;
const MG_DEVELOPED_QUEEN: i32 = -26;
const MG_BAD_BISHOP_PAWN: i32 = -3;
const EG_BAD_BISHOP_PAWN: i32 = -5;
const MG_KNIGHT_OUTPOST: i32 = 15;
const MG_BISHOP_OUTPOST: i32 = 10;
const MG_CENTER_PAWN: i32 = 4;
const EG_KING_PASSER_PROXIMITY: i32 = 6;

// Game phase: 0 = full material, 1 = pawns and kings only.
const PHASE_WEIGHTS: [i32; 4] = [1, 1, 2, 4]; // N, B, R, Q
const PHASE_TOTAL: i32 = 24;
const PHASE_MIN: f64 = -0.5;
const PHASE_MAX: f64 = 1.25;

const EVAL_CLAMP: i32 = 20000;

const PAWN_CACHE_SIZE: usize = 16384;

#[derive(Clone, Copy, Default)]
struct PawnCacheEntry {
    key: u64,
    mg: i32,
    eg: i32,
    white_passers: u64,
    black_passers: u64,
}

/// Accumulates a tapered (middlegame, endgame) pair.
#[derive(Clone, Copy, Default)]
struct Taper {
    mg: i32,
    eg: i32,
}

impl Taper {
    #[inline(always)]
    fn add(&mut self, mg: i32, eg: i32) {
        self.mg += mg;
        self.eg += eg;
    }
}

pub struct HandcraftedEval {
    pawn_cache: Box<[PawnCacheEntry]>,
}

impl Default for HandcraftedEval {
    fn default() -> Self {
        Self::new()
    }
}

impl HandcraftedEval {
    pub fn new() -> Self {
        HandcraftedEval {
            pawn_cache: vec![PawnCacheEntry::default(); PAWN_CACHE_SIZE].into_boxed_slice(),
        }
    }

    /// Phase interpolation factor in [0, 1].
    fn game_phase(board: &Board) -> f64 {
        let mut weight = 0;
        for (i, kind) in [
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Rook,
            PieceKind::Queen,
        ]
        .iter()
        .enumerate()
        {
            let count = (board.pieces(*kind, Color::White) | board.pieces(*kind, Color::Black))
                .popcount() as i32;
            weight += count * PHASE_WEIGHTS[i];
        }
        let raw = (PHASE_TOTAL - weight.min(PHASE_TOTAL)) as f64 / PHASE_TOTAL as f64;
        // Stretch past both ends so early exchanges do not register and a
        // queenless middlegame already reads as an endgame.
        (raw * (PHASE_MAX - PHASE_MIN) + PHASE_MIN).clamp(0.0, 1.0)
    }

    fn material(board: &Board, color: Color) -> Taper {
        let mut score = Taper::default();

        let total_pawns = (board.pieces(PieceKind::Pawn, Color::White)
            | board.pieces(PieceKind::Pawn, Color::Black))
        .popcount() as i32;

        for (i, kind) in [
            PieceKind::Pawn,
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Rook,
            PieceKind::Queen,
        ]
        .iter()
        .enumerate()
        {
            let count = board.pieces(*kind, color).popcount() as i32;
            score.add(count * MG_PIECE_VALUE[i], count * EG_PIECE_VALUE[i]);
        }

        let knights = board.pieces(PieceKind::Knight, color).popcount() as i32;
        let rooks = board.pieces(PieceKind::Rook, color).popcount() as i32;
        let adjustment =
            knights * KNIGHT_PAWN_BONUS * total_pawns + rooks * ROOK_CAPTURED_PAWN_BONUS * (16 - total_pawns);
        score.add(adjustment, adjustment);

        if board.pieces(PieceKind::Bishop, color).popcount() >= 2 {
            score.add(MG_BISHOP_PAIR, EG_BISHOP_PAIR);
        }

        score
    }

    fn psqt_sum(board: &Board, color: Color) -> Taper {
        let mut score = Taper::default();
        for kind in ALL_KINDS {
            for sq in BitIter(board.pieces(kind, color)) {
                let (mg, eg) = pst::psqt(kind, color, sq);
                score.add(mg, eg);
            }
        }
        score
    }

    /// Pure pawn-structure score from White's view plus both passer sets,
    /// served from the cache when the pawn formation repeats.
    fn pawn_structure(&mut self, board: &Board) -> (Taper, u64, u64) {
        let wp = board.pieces(PieceKind::Pawn, Color::White);
        let bp = board.pieces(PieceKind::Pawn, Color::Black);
        let key = wp
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .rotate_left(29)
            ^ bp.wrapping_mul(0xC2B2_AE3D_27D4_EB4F);

        let slot = (key as usize) & (PAWN_CACHE_SIZE - 1);
        let entry = self.pawn_cache[slot];
        if entry.key == key && (wp | bp) != 0 {
            return (
                Taper {
                    mg: entry.mg,
                    eg: entry.eg,
                },
                entry.white_passers,
                entry.black_passers,
            );
        }

        let white = Self::pawn_terms(board, Color::White);
        let black = Self::pawn_terms(board, Color::Black);
        let score = Taper {
            mg: white.0.mg - black.0.mg,
            eg: white.0.eg - black.0.eg,
        };

        self.pawn_cache[slot] = PawnCacheEntry {
            key,
            mg: score.mg,
            eg: score.eg,
            white_passers: white.1,
            black_passers: black.1,
        };

        (score, white.1, black.1)
    }

    /// Structure terms for one side; returns the score and the passer set.
    fn pawn_terms(board: &Board, color: Color) -> (Taper, u64) {
        let mut score = Taper::default();
        let own = board.pieces(PieceKind::Pawn, color);
        let enemy = board.pieces(PieceKind::Pawn, color.opposite());
        let mut passers = 0u64;

        // Doubled pawns, counted once per extra pawn on a file, and pawn
        // islands.
        let mut islands = 0;
        let mut prev_file_occupied = false;
        for file in 0..8u8 {
            let on_file = (own & masks::file_mask(file)).popcount() as i32;
            if on_file > 1 {
                score.add(
                    (on_file - 1) * MG_PAWN_DOUBLED,
                    (on_file - 1) * EG_PAWN_DOUBLED,
                );
            }
            if on_file > 0 && !prev_file_occupied {
                islands += 1;
            }
            prev_file_occupied = on_file > 0;
        }
        if islands > 1 {
            score.add(
                (islands - 1) * MG_PAWN_ISLAND,
                (islands - 1) * EG_PAWN_ISLAND,
            );
        }

        for sq in BitIter(own) {
            let square = Square::from_index(sq);
            let file = square.file();

            let isolated = own & masks::neighbor_files(file) == 0;
            if isolated {
                score.add(MG_PAWN_ISOLATED, EG_PAWN_ISOLATED);
            }

            if own & masks::connected_mask(sq) != 0 {
                score.add(MG_PAWN_CONNECTED, EG_PAWN_CONNECTED);
            }

            let protected = own & masks::chain_mask(color, sq) != 0;
            if protected {
                score.add(MG_PAWN_CHAIN, EG_PAWN_CHAIN);
            }

            let relative_rank = match color {
                Color::White => square.rank() as i32,
                Color::Black => 7 - square.rank() as i32,
            };
            let advancement = relative_rank - 1;

            if enemy & masks::sentry_mask(color, sq) == 0 {
                // Passed pawn.
                passers |= square.bb();
                score.add(
                    MG_PAWN_PASSED_BASE + MG_PAWN_PASSED_RANK_MULT * advancement,
                    EG_PAWN_PASSED_BASE + EG_PAWN_PASSED_RANK_MULT * advancement,
                );
                if protected {
                    score.add(MG_PASSED_PROTECTION, EG_PASSED_PROTECTION);
                }
            } else if enemy & masks::front_span(color, sq) == 0 {
                // Candidate: the file ahead is clear but flanking sentries
                // remain.
                score.add(
                    (MG_PAWN_PASSED_BASE + MG_PAWN_PASSED_RANK_MULT * advancement) / 2,
                    (EG_PAWN_PASSED_BASE + EG_PAWN_PASSED_RANK_MULT * advancement) / 2,
                );
            } else if !isolated {
                // Backward: the stop square is covered by an enemy pawn and
                // no friendly pawn is level or behind on a neighbor file.
                let stop = match color {
                    Color::White => sq + 8,
                    Color::Black => sq - 8,
                };
                let stop_covered = tables::pawn_attacks(stop, color) & enemy != 0;
                let support_behind =
                    own & masks::neighbor_files(file) & !masks::sentry_mask(color, sq) != 0;
                if stop_covered && !support_behind {
                    score.add(MG_PAWN_BACKWARD, EG_PAWN_BACKWARD);
                }
            }
        }

        (score, passers)
    }

    /// King safety for `color`'s king (negative terms weigh against it).
    fn king_safety(board: &Board, color: Color) -> Taper {
        let mut score = Taper::default();
        let them = color.opposite();
        let king_sq = board.king_square(color);
        let king = king_sq.index();
        let own_pawns = board.pieces(PieceKind::Pawn, color);
        let enemy_pawns = board.pieces(PieceKind::Pawn, them);

        // Shield.
        let shield = (own_pawns & masks::shield_mask(color, king)).popcount() as i32;
        score.add(shield * MG_PAWN_SHIELD, 0);

        // Open and semi-open files around the king.
        let king_file = king_sq.file();
        if own_pawns & masks::file_mask(king_file) == 0 {
            score.add(MG_KING_OPEN_FILE, 0);
        }
        for df in [-1i32, 1] {
            let f = king_file as i32 + df;
            if (0..8).contains(&f) && own_pawns & masks::file_mask(f as u8) == 0 {
                score.add(MG_KING_SEMI_OPEN_NEIGHBOR, 0);
            }
        }

        // Pawn storm: enemy pawns marching down the king's sector.
        for sq in BitIter(enemy_pawns & (masks::file_mask(king_file) | masks::neighbor_files(king_file))) {
            let rank = sq / 8;
            let advanced = match them {
                Color::White => rank as i32 - 1,
                Color::Black => 6 - rank as i32,
            };
            if advanced > 0 {
                score.add(-(MG_PAWN_STORM_BASE + MG_PAWN_STORM_RANK_MULT * advanced), 0);
            }
        }

        // Attack zone: weighted count of enemy piece attacks into the zone,
        // mapped through the safety table.
        let zone = masks::king_zone(color, king);
        let occ = board.occupied();
        let mut threat = 0i32;

        for sq in BitIter(board.pieces(PieceKind::Knight, them)) {
            threat +=
                KING_ZONE_KNIGHT_WEIGHT * (tables::knight_attacks(sq) & zone).popcount() as i32;
        }
        for sq in BitIter(board.pieces(PieceKind::Bishop, them)) {
            threat +=
                KING_ZONE_BISHOP_WEIGHT * (magic::bishop_attacks(sq, occ) & zone).popcount() as i32;
        }
        for sq in BitIter(board.pieces(PieceKind::Rook, them)) {
            threat +=
                KING_ZONE_ROOK_WEIGHT * (magic::rook_attacks(sq, occ) & zone).popcount() as i32;
        }
        for sq in BitIter(board.pieces(PieceKind::Queen, them)) {
            threat +=
                KING_ZONE_QUEEN_WEIGHT * (magic::queen_attacks(sq, occ) & zone).popcount() as i32;
        }

        let idx = (threat as usize).min(KING_SAFETY_TABLE.len() - 1);
        score.add(-KING_SAFETY_TABLE[idx], 0);

        score
    }

    /// Safe-square mobility: minors avoid enemy pawn attacks, rooks also
    /// avoid minor attacks.
    fn mobility(board: &Board, color: Color) -> Taper {
        let mut score = Taper::default();
        let them = color.opposite();
        let occ = board.occupied();
        let own = board.occupancy(color);

        let enemy_pawns = board.pieces(PieceKind::Pawn, them);
        let pawn_attacked = match them {
            Color::White => enemy_pawns.north_east() | enemy_pawns.north_west(),
            Color::Black => enemy_pawns.south_east() | enemy_pawns.south_west(),
        };
        let minor_attacked = board.attacks_by_piece[them as usize][PieceKind::Knight as usize]
            | board.attacks_by_piece[them as usize][PieceKind::Bishop as usize];

        let minor_safe = !own & !pawn_attacked;
        let rook_safe = minor_safe & !minor_attacked;

        for sq in BitIter(board.pieces(PieceKind::Knight, color)) {
            let reach = (tables::knight_attacks(sq) & minor_safe).popcount() as i32;
            score.add(reach * MG_MOBILITY[0], reach * EG_MOBILITY[0]);
        }
        for sq in BitIter(board.pieces(PieceKind::Bishop, color)) {
            let reach = (magic::bishop_attacks(sq, occ) & minor_safe).popcount() as i32;
            score.add(reach * MG_MOBILITY[1], reach * EG_MOBILITY[1]);
        }
        for sq in BitIter(board.pieces(PieceKind::Rook, color)) {
            let reach = (magic::rook_attacks(sq, occ) & rook_safe).popcount() as i32;
            score.add(reach * MG_MOBILITY[2], reach * EG_MOBILITY[2]);
        }

        score
    }

    fn positional(board: &Board, color: Color, own_passers: u64, enemy_passers: u64) -> Taper {
        let mut score = Taper::default();
        let them = color.opposite();
        let own_pawns = board.pieces(PieceKind::Pawn, color);
        let enemy_pawns = board.pieces(PieceKind::Pawn, them);
        let all_pawns = own_pawns | enemy_pawns;

        // Rooks on open and semi-open files; rooks behind passers.
        for sq in BitIter(board.pieces(PieceKind::Rook, color)) {
            let file = masks::file_mask(sq % 8);
            if all_pawns & file == 0 {
                score.add(MG_ROOK_OPEN_FILE, EG_ROOK_OPEN_FILE);
            } else if own_pawns & file == 0 {
                score.add(MG_ROOK_SEMI_OPEN_FILE, EG_ROOK_SEMI_OPEN_FILE);
            }

            // Behind an own passer means in its rear span; behind an enemy
            // passer blocks it from the back.
            for passer in BitIter((own_passers | enemy_passers) & file) {
                let passer_color = if own_passers.has(passer) { color } else { them };
                let rear = masks::front_span(passer_color.opposite(), passer);
                if rear.has(sq) {
                    score.add(0, EG_ROOK_BEHIND_PASSER);
                }
            }
        }

        // Blocked passers.
        for sq in BitIter(own_passers) {
            let stop = match color {
                Color::White => sq as i32 + 8,
                Color::Black => sq as i32 - 8,
            };
            if (0..64).contains(&stop) && board.occupied().has(stop as u8) {
                score.add(MG_BLOCKED_PASSER, EG_BLOCKED_PASSER);
            }
        }

        // A queen out before the minor pieces.
        let queens = board.pieces(PieceKind::Queen, color);
        if queens != 0 {
            let (back_rank, minor_homes) = match color {
                Color::White => (crate::bitboard::RANK_1, (1u64 << 1) | (1 << 2) | (1 << 5) | (1 << 6)),
                Color::Black => (
                    crate::bitboard::RANK_8,
                    (1u64 << 57) | (1 << 58) | (1 << 61) | (1 << 62),
                ),
            };
            let undeveloped = ((board.pieces(PieceKind::Knight, color)
                | board.pieces(PieceKind::Bishop, color))
                & minor_homes)
                .popcount();
            if queens & back_rank == 0 && undeveloped >= 2 {
                score.add(MG_DEVELOPED_QUEEN, 0);
            }
        }

        // Bad bishop: own pawns fixed on the bishop's color.
        for sq in BitIter(board.pieces(PieceKind::Bishop, color)) {
            let same_color_mask = if masks::LIGHT_SQUARES.has(sq) {
                masks::LIGHT_SQUARES
            } else {
                masks::DARK_SQUARES
            };
            let cramping = (own_pawns & same_color_mask).popcount() as i32;
            score.add(cramping * MG_BAD_BISHOP_PAWN, cramping * EG_BAD_BISHOP_PAWN);
        }

        // Outposts: minors on strong squares in the enemy half, anchored by
        // a pawn and safe from enemy pawns.
        let enemy_half = match color {
            Color::White => 0xFFFF_FFFF_0000_0000u64,
            Color::Black => 0x0000_0000_FFFF_FFFFu64,
        };
        let minors =
            board.pieces(PieceKind::Knight, color) | board.pieces(PieceKind::Bishop, color);
        for sq in BitIter(minors & enemy_half) {
            let anchored = own_pawns & masks::chain_mask(color, sq) != 0;
            let raidable = enemy_pawns & masks::sentry_mask(color, sq) & !masks::front_span(color, sq) != 0;
            if anchored && !raidable {
                let bonus = if board.pieces(PieceKind::Knight, color).has(sq) {
                    MG_KNIGHT_OUTPOST
                } else {
                    MG_BISHOP_OUTPOST
                };
                score.add(bonus, 0);
            }
        }

        // Center space.
        let center_pawns = (own_pawns & masks::EXTENDED_CENTER).popcount() as i32;
        score.add(center_pawns * MG_CENTER_PAWN, 0);

        // Endgame king activity: stay close to own passers.
        if own_passers != 0 {
            let king = board.king_square(color);
            for sq in BitIter(own_passers) {
                let dist = endgame::chebyshev(king, Square::from_index(sq));
                score.add(0, (7 - dist) * EG_KING_PASSER_PROXIMITY);
            }
        }

        score
    }

    /// White-view score before perspective flip.
    fn evaluate_white_view(&mut self, board: &Board) -> i32 {
        let mut total = Taper::default();

        for (color, sign) in [(Color::White, 1), (Color::Black, -1)] {
            let material = Self::material(board, color);
            let psqt = Self::psqt_sum(board, color);
            let safety = Self::king_safety(board, color);
            let mobility = Self::mobility(board, color);
            total.add(
                sign * (material.mg + psqt.mg + safety.mg + mobility.mg),
                sign * (material.eg + psqt.eg + safety.eg + mobility.eg),
            );
        }

        let (pawns, white_passers, black_passers) = self.pawn_structure(board);
        total.add(pawns.mg, pawns.eg);

        let white_pos = Self::positional(board, Color::White, white_passers, black_passers);
        let black_pos = Self::positional(board, Color::Black, black_passers, white_passers);
        total.add(white_pos.mg - black_pos.mg, white_pos.eg - black_pos.eg);

        // Rule of the square, only trustworthy against a pieceless defender.
        let stm_white = board.side_to_move == Color::White;
        total.add(
            0,
            endgame::unstoppable_passers(board, Color::White, white_passers, stm_white)
                - endgame::unstoppable_passers(board, Color::Black, black_passers, !stm_white),
        );

        let phase = Self::game_phase(board);
        let mut score =
            (total.mg as f64 * (1.0 - phase) + total.eg as f64 * phase).round() as i32;

        // Endgame rescoring for won material configurations.
        for (strong, sign) in [(Color::White, 1), (Color::Black, -1)] {
            if endgame::is_knb_vs_k(board, strong) {
                score += sign * endgame::knb_corner_drive(board, strong);
            } else if endgame::is_bare_king(board, strong.opposite())
                && board.occupancy(strong).popcount() > 1
            {
                score += sign * endgame::mop_up(board, strong);
            }
        }

        score.clamp(-EVAL_CLAMP, EVAL_CLAMP)
    }
}

impl Evaluator for HandcraftedEval {
    fn evaluate(&mut self, board: &Board) -> i32 {
        let white_view = self.evaluate_white_view(board);
        match board.side_to_move {
            Color::White => white_view,
            Color::Black => -white_view,
        }
    }
}
