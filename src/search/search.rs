//! Iterative-deepening principal-variation search with aspiration windows,
//! quiescence, verified null-move pruning, internal iterative deepening,
//! singular extensions, futility and late-move pruning, late-move
//! reductions, killer/history/counter-move ordering and a multi-PV root.
//!
//! Depth is in sixths of a ply (`ONE_PLY`); ply counts the distance from the
//! root. Scores are always from the side to move's view.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use arrayvec::ArrayVec;
use tracing::info;

use crate::board::{Board, PieceKind};
use crate::eval::masks;
use crate::eval::Evaluator;
use crate::moves::movegen::MoveList;
use crate::moves::types::Move;
use crate::search::context::SearchContext;
use crate::search::params::*;
use crate::search::tt::{Bound, TranspositionTable, TtEntry};

/// One root line: the move sequence and its score from the root mover's
/// view.
#[derive(Debug, Clone)]
pub struct Variation {
    pub moves: Vec<Move>,
    pub score: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Pv,
    Cut,
    All,
}

#[derive(Clone, Copy, Default)]
struct Frame {
    preliminary: i32,
    plausible: bool,
}

type ScoredMoves = ArrayVec<(Move, i32), 256>;

/// Mate scores are stored in the table relative to the storing node, not
/// the root, so they stay valid across transpositions.
fn score_to_tt(score: i32, ply: i32) -> i32 {
    if is_mate_score(score) {
        if score > 0 {
            score + ply
        } else {
            score - ply
        }
    } else {
        score
    }
}

fn score_from_tt(score: i32, ply: i32) -> i32 {
    if is_mate_score(score) {
        if score > 0 {
            score - ply
        } else {
            score + ply
        }
    } else {
        score
    }
}

pub struct SearchWorker<'a, E: Evaluator> {
    board: Board,
    evaluator: &'a mut E,
    tt: &'a TranspositionTable,
    stop: &'a AtomicBool,
    deadline: Option<Instant>,
    ctx: SearchContext,
    frames: Vec<Frame>,
    nodes: u64,
    checkup_countdown: u64,
    /// Nominal depth of the running iteration, in plies.
    current_depth: i32,
    root_age: u16,
    extensions_on_path: i32,
    num_variations: usize,
    variations: Vec<Variation>,
}

impl<'a, E: Evaluator> SearchWorker<'a, E> {
    pub fn new(
        board: Board,
        evaluator: &'a mut E,
        tt: &'a TranspositionTable,
        stop: &'a AtomicBool,
        deadline: Option<Instant>,
        num_variations: usize,
    ) -> Self {
        SearchWorker {
            board,
            evaluator,
            tt,
            stop,
            deadline,
            ctx: SearchContext::new(),
            frames: vec![Frame::default(); MAX_PLY + 1],
            nodes: 0,
            checkup_countdown: NODES_PER_CHECKUP,
            current_depth: 1,
            root_age: 0,
            extensions_on_path: 0,
            num_variations: num_variations.max(1),
            variations: Vec::new(),
        }
    }

    pub fn nodes(&self) -> u64 {
        self.nodes
    }

    /// Iterative deepening driver. Returns the variations of the deepest
    /// fully completed iteration.
    pub fn iterate(&mut self, max_depth: i32) -> Vec<Variation> {
        self.root_age = self.board.ply as u16;
        let start = Instant::now();
        let mut expected = self.evaluator.evaluate(&self.board);

        for depth in 1..=max_depth {
            self.current_depth = depth;
            let score = self.root_aspiration(depth * ONE_PLY, expected);

            if self.stopped() {
                // The interrupted iteration's results are discarded; the
                // previous iteration's variations stand.
                break;
            }
            expected = score;

            if let Some(variation) = self.variations.first() {
                let pv: Vec<String> =
                    variation.moves.iter().map(|m| m.to_uci()).collect();
                info!(
                    depth,
                    score,
                    nodes = self.nodes,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    pv = %pv.join(" "),
                    "iteration complete"
                );
            }

            // A proven mate cannot be improved by looking deeper.
            if is_mate_score(score) {
                break;
            }
        }

        self.variations.clone()
    }

    // ---- Control ----

    #[inline(always)]
    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed) && self.current_depth > 1
    }

    #[inline(always)]
    fn checkup(&mut self) {
        if self.checkup_countdown == 0 {
            self.checkup_countdown = NODES_PER_CHECKUP;
            if let Some(deadline) = self.deadline {
                if Instant::now() >= deadline {
                    self.stop.store(true, Ordering::Relaxed);
                }
            }
        }
        self.checkup_countdown = self.checkup_countdown.saturating_sub(1);
    }

    // ---- Make / undo with evaluator hooks ----

    fn make(&mut self, mv: Move) {
        self.evaluator.update_before_move(&self.board, mv);
        self.board.make_move(mv);
        self.evaluator.update_after_move(&self.board);
    }

    fn undo(&mut self, mv: Move) {
        self.evaluator.update_before_undo(&self.board);
        self.board.undo_move();
        self.evaluator.update_after_undo(&self.board, mv);
    }

    // ---- Move ordering ----

    /// Score and sort a move list, best first. The counter move of the
    /// opponent's last move earns a history bonus.
    fn score_moves(&mut self, moves: &MoveList, ply: usize, hash_move: Move) -> ScoredMoves {
        let side = self.board.side_to_move;
        let counter = {
            let prev = self.board.last_move();
            if prev.exists() {
                match self.board.piece_kind_at(prev.destination()) {
                    Some(kind) => self.ctx.counter_move(side, kind, prev.destination()),
                    None => Move::NULL,
                }
            } else {
                Move::NULL
            }
        };

        let mut scored = ScoredMoves::new();
        for &mv in moves.iter() {
            let score = if mv == hash_move {
                HASH_MOVE_SCORE
            } else if mv.is_capture() || mv.is_promotion() {
                let see = self.evaluator.score_move_see(&self.board, mv) as i32;
                if see >= 0 {
                    (GOOD_CAPTURE_NEUTRAL + see).clamp(GOOD_CAPTURE_MIN, GOOD_CAPTURE_MAX)
                } else {
                    let history = self.ctx.history_score(side, mv);
                    (history / self.current_depth + see).clamp(QUIET_MIN, QUIET_MAX)
                }
            } else if self.ctx.is_killer(ply, mv)
                || (ply >= 2 && self.ctx.is_killer(ply - 2, mv))
            {
                KILLER_MOVE_SCORE
            } else {
                let mut history = self.ctx.history_score(side, mv);
                if mv == counter {
                    history += COUNTER_MOVE_BONUS;
                }
                (history / self.current_depth).clamp(QUIET_MIN, QUIET_MAX)
            };
            scored.push((mv, score));
        }

        scored.sort_unstable_by_key(|&(_, s)| -s);
        scored
    }

    /// Quiescence ordering: captures by SEE, losers dropped unless the side
    /// to move must escape check.
    fn score_moves_quiescence(&mut self, moves: &MoveList, in_check: bool) -> ScoredMoves {
        let side = self.board.side_to_move;
        let mut scored = ScoredMoves::new();

        for &mv in moves.iter() {
            if mv.is_capture() || mv.is_promotion() {
                let see = self.evaluator.score_move_see(&self.board, mv) as i32;
                if see < 0 && !in_check {
                    continue;
                }
                let score = (GOOD_CAPTURE_NEUTRAL + see).clamp(QUIET_MIN, GOOD_CAPTURE_MAX);
                scored.push((mv, score));
            } else {
                debug_assert!(in_check);
                let history = self.ctx.history_score(side, mv);
                scored.push((mv, (history / self.current_depth).clamp(QUIET_MIN, QUIET_MAX)));
            }
        }

        scored.sort_unstable_by_key(|&(_, s)| -s);
        scored
    }

    // ---- Transposition helpers ----

    fn tt_store(&self, score: i32, depth: i32, ply: i32, bound: Bound, best_move: Move) {
        let entry = TtEntry {
            best_move,
            score: score_to_tt(score, ply).clamp(i16::MIN as i32, i16::MAX as i32) as i16,
            depth: (depth / ONE_PLY).clamp(0, u8::MAX as i32) as u8,
            bound,
            age: self.root_age,
        };
        self.tt.put(self.board.zobrist, entry);
    }

    // ---- Extensions / reductions ----

    /// Late-move reduction: logarithmic in depth, softened by a good
    /// history, rounded down to whole plies.
    fn determine_reduction(&self, move_index: usize, move_score: i32, depth: i32, mv: Move) -> i32 {
        if move_index <= 1 {
            return 0;
        }
        if move_score >= GOOD_CAPTURE_MIN || mv.is_promotion() {
            return 0;
        }

        let depth_plies = (depth / ONE_PLY).max(1) as f64;
        let mut reduction = ONE_PLY as f64 * (depth_plies.ln() / 6f64.ln() + 1.0);

        // The mover has already switched, so the history entry belongs to
        // the opposite side.
        let history = self
            .ctx
            .history_score(self.board.side_to_move.opposite(), mv);
        reduction += -(history as f64) * ONE_PLY as f64 / 12000.0;

        ((reduction as i32) / ONE_PLY * ONE_PLY).max(0)
    }

    /// True while the heuristic extension budget for this path lasts.
    fn allow_heuristic_extensions(&self, plausible: bool) -> bool {
        let divisor = 3 - plausible as i32;
        self.extensions_on_path < self.current_depth / divisor * ONE_PLY
    }

    /// A pawn move whose destination is no longer guarded by enemy sentries
    /// just created or pushed a passer.
    fn is_passed_pawn_push(&self, mv: Move) -> bool {
        let mover = self.board.side_to_move.opposite();
        if self.board.piece_kind_at(mv.destination()) != Some(PieceKind::Pawn) {
            return false;
        }
        let enemy_pawns = self.board.pieces(PieceKind::Pawn, mover.opposite());
        enemy_pawns & masks::sentry_mask(mover, mv.destination().index()) == 0
    }

    // ---- Root ----

    /// Aspiration loop around the root search (§ iterative deepening).
    fn root_aspiration(&mut self, depth: i32, expected: i32) -> i32 {
        if depth <= ONE_PLY {
            return self.pv_search_root(depth, MIN_SCORE, MAX_SCORE);
        }

        let (lower_expected, upper_expected) = if self.variations.is_empty() {
            (expected, expected)
        } else {
            (
                self.variations.last().map(|v| v.score).unwrap_or(expected),
                self.variations.first().map(|v| v.score).unwrap_or(expected),
            )
        };

        let mut alpha_margin = ASP_WINDOW;
        let mut beta_margin = ASP_WINDOW;
        let mut alpha_widenings = 0;
        let mut beta_widenings = 0;

        let mut alpha = lower_expected - alpha_margin;
        let mut beta = upper_expected + beta_margin;

        let mut score = self.pv_search_root(depth, alpha, beta);

        while (score <= alpha || score >= beta) && !self.stopped() {
            if score <= alpha {
                alpha_widenings += 1;
                if alpha_widenings >= ASP_MAX_WIDENINGS {
                    alpha = MIN_SCORE;
                } else {
                    alpha_margin *= ASP_STEP_FACTOR;
                    alpha = lower_expected - alpha_margin;
                }
            } else {
                beta_widenings += 1;
                if beta_widenings >= ASP_MAX_WIDENINGS {
                    beta = MAX_SCORE;
                } else {
                    beta_margin *= ASP_STEP_FACTOR;
                    beta = upper_expected + beta_margin;
                }
            }
            score = self.pv_search_root(depth, alpha, beta);
        }

        score
    }

    /// Root move scores: last iteration's variations lead, then the usual
    /// bands.
    fn score_root_moves(&mut self, moves: &MoveList) -> ScoredMoves {
        let side = self.board.side_to_move;
        let previous_best: Vec<Move> = self
            .variations
            .iter()
            .filter_map(|v| v.moves.first().copied())
            .collect();

        let mut scored = ScoredMoves::new();
        for &mv in moves.iter() {
            let score = if let Some(rank) = previous_best.iter().position(|&m| m == mv) {
                HASH_MOVE_SCORE - rank as i32
            } else if mv.is_capture() || mv.is_promotion() {
                let see = self.evaluator.score_move_see(&self.board, mv) as i32;
                if see >= 0 {
                    (GOOD_CAPTURE_NEUTRAL + see).clamp(GOOD_CAPTURE_MIN, GOOD_CAPTURE_MAX)
                } else {
                    (self.ctx.history_score(side, mv) / self.current_depth + see)
                        .clamp(QUIET_MIN, QUIET_MAX)
                }
            } else if self.ctx.is_killer(0, mv) {
                KILLER_MOVE_SCORE
            } else {
                (self.ctx.history_score(side, mv) / self.current_depth)
                    .clamp(QUIET_MIN, QUIET_MAX)
            };
            scored.push((mv, score));
        }

        scored.sort_unstable_by_key(|&(_, s)| -s);
        scored
    }

    /// Multi-PV root node: the first `num_variations` moves get full
    /// windows, the rest race the worst stored variation with a zero
    /// window. Returns the worst stored variation's score.
    fn pv_search_root(&mut self, depth: i32, mut alpha: i32, beta: i32) -> i32 {
        for ply in 0..MAX_PLY {
            self.ctx.clear_pv(ply);
        }
        // The root is always a plausible line.
        self.frames[0] = Frame {
            preliminary: 0,
            plausible: true,
        };

        let root_moves = self.board.legal_moves();
        if root_moves.is_empty() {
            self.variations.clear();
            return if self.board.is_check() {
                -MATE_SCORE
            } else {
                DRAW_SCORE
            };
        }

        let scored = self.score_root_moves(&root_moves);
        let is_check_evasion = self.board.is_check();

        let mut pv_slots = self.num_variations as i32;
        let mut best_score = MIN_SCORE;
        let mut best_move = Move::NULL;
        let mut worst_variation_score = MIN_SCORE;
        let old_alpha = alpha;
        let mut new_variations: Vec<Variation> = Vec::new();

        for (index, &(mv, move_score)) in scored.iter().enumerate() {
            if self.stopped() {
                return 0;
            }
            self.nodes += 1;

            self.make(mv);
            let gives_check = self.board.is_check();

            let extension = if (gives_check || is_check_evasion)
                && self.allow_heuristic_extensions(true)
            {
                ONE_PLY
            } else {
                0
            };

            let mut score;
            if pv_slots > 0 {
                score = -self.pvs(
                    depth - ONE_PLY + extension,
                    1,
                    -beta,
                    -alpha,
                    NodeType::Pv,
                    NULL_MOVE_COOLDOWN,
                );
            } else {
                let reduction = if extension == 0 && !is_check_evasion && !gives_check {
                    self.determine_reduction(index, move_score, depth, mv)
                } else {
                    0
                };
                score = -self.pvs(
                    depth - ONE_PLY - reduction + extension,
                    1,
                    -alpha - 1,
                    -alpha,
                    NodeType::Cut,
                    NULL_MOVE_COOLDOWN,
                );
                if score > worst_variation_score {
                    score = -self.pvs(
                        depth - ONE_PLY + extension,
                        1,
                        -beta,
                        -alpha,
                        NodeType::Pv,
                        NULL_MOVE_COOLDOWN,
                    );
                }
            }

            self.undo(mv);

            if self.stopped() {
                return 0;
            }

            let side = self.board.side_to_move;
            self.ctx.punish_history(side, mv, self.current_depth.min(20));

            if score >= beta {
                self.tt_store(score, depth, 0, Bound::Lower, mv);
                if mv.is_quiet() {
                    self.ctx.update_killer(0, mv);
                }
                self.ctx.reward_history(side, mv, self.current_depth.min(20));
                return score;
            }

            if score > best_score {
                best_score = score;
                best_move = mv;
            }

            if score > worst_variation_score {
                let mut moves = vec![mv];
                moves.extend(self.ctx.pv_line(1).iter().copied());
                let variation = Variation { moves, score };

                let position = new_variations
                    .iter()
                    .position(|v| v.score < score)
                    .unwrap_or(new_variations.len());
                if new_variations.len() >= self.num_variations {
                    if position < new_variations.len() {
                        new_variations.insert(position, variation);
                        new_variations.pop();
                    }
                } else {
                    new_variations.insert(position, variation);
                }

                if new_variations.len() >= self.num_variations.min(scored.len()) {
                    worst_variation_score =
                        new_variations.last().map(|v| v.score).unwrap_or(MIN_SCORE);
                    if worst_variation_score > old_alpha {
                        alpha = worst_variation_score;
                    }
                }
            }

            pv_slots -= 1;
        }

        self.tt_store(best_score, depth, 0, Bound::Exact, best_move);
        self.ctx
            .reward_history(self.board.side_to_move, best_move, self.current_depth.min(20));

        if worst_variation_score > old_alpha || self.variations.is_empty() {
            self.variations = new_variations;
        }

        worst_variation_score
    }

    // ---- Principal variation search ----

    #[allow(clippy::too_many_arguments)]
    fn pvs(
        &mut self,
        mut depth: i32,
        ply: usize,
        mut alpha: i32,
        mut beta: i32,
        node_type: NodeType,
        null_cooldown: i8,
    ) -> i32 {
        self.checkup();
        if self.stopped() {
            return 0;
        }

        if depth <= 0 || ply >= MAX_PLY {
            return self.quiescence(ply, alpha, beta);
        }

        self.nodes += 1;

        if self.evaluator.is_draw(&self.board) {
            self.ctx.clear_pv(ply);
            return DRAW_SCORE;
        }

        // Mate distance pruning: a shorter mate elsewhere bounds this node.
        if alpha >= MATE_SCORE - ply as i32 {
            return alpha;
        }
        if beta <= -MATE_SCORE + ply as i32 {
            return beta;
        }

        let ply_i = ply as i32;
        let hash = self.board.zobrist;
        let mut entry = self.tt.probe(hash);

        if let Some(e) = entry {
            if node_type != NodeType::Pv && (e.depth as i32) * ONE_PLY >= depth {
                let tt_score = score_from_tt(e.score as i32, ply_i);
                match e.bound {
                    Bound::Exact => return tt_score,
                    Bound::Lower => {
                        if tt_score >= beta {
                            return tt_score;
                        }
                        if tt_score > alpha {
                            alpha = tt_score;
                        }
                    }
                    Bound::Upper => {
                        if tt_score <= alpha {
                            return tt_score;
                        }
                        if tt_score < beta {
                            beta = tt_score;
                        }
                    }
                }
            }
        }

        // Preliminary score and line plausibility for this frame.
        let preliminary = match entry {
            Some(e) => score_from_tt(e.score as i32, ply_i),
            None => self.evaluator.evaluate(&self.board),
        };
        let plausible = ply == 0
            || (self.frames[ply - 1].plausible
                && self.board.last_move().exists()
                && preliminary > alpha - 100
                && preliminary < beta + 100);
        self.frames[ply] = Frame {
            preliminary,
            plausible,
        };

        let in_check = self.board.is_check();
        let side = self.board.side_to_move;

        // Null-move pruning with verification in zugzwang-prone material.
        if null_cooldown <= 0
            && !in_check
            && node_type != NodeType::Pv
            && depth > ONE_PLY
            && self.board.has_non_pawn_material(side)
        {
            let reduction = null_move_reduction(depth);

            self.board.make_null_move();
            let null_score = -self.pvs(
                depth - reduction,
                ply + 1,
                -beta,
                -beta + 1,
                NodeType::Cut,
                NULL_MOVE_COOLDOWN,
            );
            self.board.undo_null_move();

            if null_score >= beta && !self.stopped() {
                let needs_verification = self.board.minor_major_count(side) <= 2;
                if !needs_verification || reduction >= depth + ONE_PLY {
                    return null_score;
                }
                let verified = self.pvs(
                    depth - reduction + ONE_PLY,
                    ply,
                    beta - 1,
                    beta,
                    NodeType::Cut,
                    i8::MAX,
                );
                if verified >= beta {
                    return verified;
                }
            }
        }

        self.ctx.clear_pv(ply + 1);

        // A sufficiently shallow entry costs a ply rather than helping.
        if let Some(e) = entry {
            if (e.depth as i32 + 4) * ONE_PLY <= depth {
                depth -= ONE_PLY;
            } else if node_type == NodeType::Cut
                && e.bound == Bound::Upper
                && (e.depth as i32) * ONE_PLY <= depth
            {
                depth -= ONE_PLY;
            }
            depth = depth.max(ONE_PLY);
        }

        // Hash move, re-derived by internal iterative deepening when absent
        // or from a much shallower search.
        let use_iid =
            node_type == NodeType::Pv || (node_type == NodeType::Cut && depth >= 6 * ONE_PLY);
        let mut hash_move = entry.map(|e| e.best_move).unwrap_or(Move::NULL);
        if use_iid
            && hash_move.exists()
            && entry.map_or(true, |e| (e.depth as i32) * ONE_PLY <= depth - 6 * ONE_PLY)
        {
            hash_move = Move::NULL;
        }

        let legal_moves = self.board.legal_moves();

        if hash_move.exists() && !legal_moves.contains(&hash_move) {
            // Hash collision produced a foreign move.
            hash_move = Move::NULL;
        }

        if !hash_move.exists() && use_iid {
            let reduced = depth - 3 * ONE_PLY;
            if reduced > 0 {
                self.pvs(reduced, ply, alpha, beta, NodeType::Pv, null_cooldown);
                if self.stopped() {
                    return 0;
                }
                hash_move = self
                    .ctx
                    .pv_line(ply)
                    .first()
                    .copied()
                    .filter(|m| legal_moves.contains(m))
                    .unwrap_or(Move::NULL);
                entry = self.tt.probe(hash);
            }
        }

        if self.stopped() {
            return 0;
        }

        let scored = self.score_moves(&legal_moves, ply, hash_move);

        // Singular extension: if every alternative falls far below alpha,
        // the hash move is the position's only idea and deserves a ply.
        let mut singular_extension = 0;
        let singular_depth = (depth / (2 * ONE_PLY) * ONE_PLY).min(depth - 4 * ONE_PLY);
        let singular_applicable = node_type == NodeType::Cut
            && singular_depth > 0
            && !is_mate_score(alpha)
            && hash_move.exists()
            && entry.map_or(false, |e| {
                (e.depth as i32) * ONE_PLY >= singular_depth
                    && score_from_tt(e.score as i32, ply_i) > alpha
                    && e.bound != Bound::Upper
            });

        if singular_applicable {
            let reduced_alpha = alpha - 100;
            singular_extension = ONE_PLY;

            for &(mv, _) in scored.iter() {
                if mv == hash_move {
                    continue;
                }
                self.make(mv);
                let score = -self.pvs(
                    singular_depth,
                    ply + 1,
                    -reduced_alpha - 1,
                    -reduced_alpha,
                    NodeType::All,
                    null_cooldown,
                );
                self.undo(mv);

                if score > reduced_alpha {
                    let entry_score =
                        entry.map_or(MIN_SCORE, |e| score_from_tt(e.score as i32, ply_i));
                    if score >= beta && entry_score >= beta {
                        return beta;
                    }
                    singular_extension = 0;
                    break;
                }
            }
        }

        let allow_extensions = self.allow_heuristic_extensions(plausible);
        let lmp_threshold = lmp_count(depth, in_check, plausible);

        let mut tt_bound = Bound::Upper;
        let mut best_score = MIN_SCORE;
        let mut best_move = Move::NULL;
        let mut move_count: i32 = 0;

        for (index, &(mv, move_score)) in scored.iter().enumerate() {
            // Futility pruning: hopeless quiet moves in the last two plies.
            let futility_candidate = depth <= 2 * ONE_PLY
                && move_score < KILLER_MOVE_SCORE
                && !in_check
                && node_type != NodeType::Pv
                && !(is_mate_score(alpha) || is_mate_score(beta))
                && !mv.is_capture();

            self.make(mv);
            let gives_check = self.board.is_check();

            if futility_candidate
                && !gives_check
                && preliminary + futility_margin(depth) < alpha
            {
                self.undo(mv);
                if move_count == 0 {
                    best_score = preliminary;
                    best_move = mv;
                }
                move_count += 1;
                continue;
            }

            // Late-move pruning: quiet late movers with no history in
            // non-PV nodes.
            if node_type != NodeType::Pv
                && move_count >= lmp_threshold
                && !(mv.is_capture() || mv.is_promotion())
                && move_score <= NEUTRAL_SCORE
                && !is_mate_score(alpha)
                && !gives_check
            {
                self.undo(mv);
                move_count += 1;
                continue;
            }

            let child_type = if node_type == NodeType::Pv && move_count == 0 {
                NodeType::Pv
            } else if node_type == NodeType::Cut {
                NodeType::All
            } else {
                NodeType::Cut
            };

            let mut extension = if move_count == 0 { singular_extension } else { 0 };
            let mut is_passer_push = false;

            if gives_check || in_check {
                if extension == 0 && allow_extensions {
                    extension += ONE_PLY;
                }
            } else if self.is_passed_pawn_push(mv) {
                if extension == 0 && allow_extensions {
                    extension += TWO_THIRDS_PLY;
                }
                is_passer_push = true;
            }

            self.extensions_on_path += extension;

            let mut score;
            if move_count == 0 {
                score = -self.pvs(
                    depth - ONE_PLY + extension,
                    ply + 1,
                    -beta,
                    -alpha,
                    child_type,
                    null_cooldown.saturating_sub(1),
                );
            } else {
                let mut reduction = 0;
                if extension == 0 && !in_check {
                    reduction = self.determine_reduction(index, move_score, depth, mv);
                    if gives_check || is_passer_push {
                        reduction -= ONE_PLY;
                    }
                    reduction = reduction.max(0);
                }

                score = -self.pvs(
                    depth - ONE_PLY + extension - reduction,
                    ply + 1,
                    -alpha - 1,
                    -alpha,
                    child_type,
                    null_cooldown.saturating_sub(1),
                );

                if score > alpha && (reduction > 0 || score < beta) {
                    let research_type = if node_type == NodeType::Pv {
                        NodeType::Pv
                    } else {
                        NodeType::All
                    };
                    score = -self.pvs(
                        depth - ONE_PLY + extension,
                        ply + 1,
                        -beta,
                        -alpha,
                        research_type,
                        null_cooldown.saturating_sub(1).max(1),
                    );
                }
            }

            self.extensions_on_path -= extension;
            self.undo(mv);

            if self.stopped() {
                return 0;
            }

            if score >= beta {
                self.tt_store(score, depth, ply_i, Bound::Lower, mv);

                if !mv.is_capture() && !mv.is_promotion() {
                    self.ctx.update_killer(ply, mv);
                    self.store_counter_move(mv);
                }
                self.ctx
                    .reward_history(side, mv, depth / ONE_PLY);

                return score;
            }

            self.ctx.punish_history(side, mv, depth / ONE_PLY);

            if score > best_score {
                best_score = score;
                best_move = mv;

                if score > alpha {
                    tt_bound = Bound::Exact;
                    alpha = score;
                    self.ctx.add_pv_move(ply, mv);
                }
            }

            move_count += 1;
        }

        // No legal moves: mate or stalemate.
        if move_count == 0 {
            self.ctx.clear_pv(ply);
            return if in_check {
                -MATE_SCORE + ply_i
            } else {
                DRAW_SCORE
            };
        }

        self.tt_store(best_score, depth, ply_i, tt_bound, best_move);

        if tt_bound == Bound::Exact {
            self.ctx.reward_history(side, best_move, depth / ONE_PLY);
            if !best_move.is_capture() && !best_move.is_promotion() {
                self.store_counter_move(best_move);
            }
        }

        best_score
    }

    /// Record `mv` as the refutation of the opponent's last move.
    fn store_counter_move(&mut self, mv: Move) {
        let prev = self.board.last_move();
        if !prev.exists() {
            return;
        }
        if let Some(kind) = self.board.piece_kind_at(prev.destination()) {
            self.ctx
                .set_counter_move(self.board.side_to_move, kind, prev.destination(), mv);
        }
    }

    // ---- Quiescence ----

    pub(crate) fn quiescence(&mut self, ply: usize, mut alpha: i32, beta: i32) -> i32 {
        self.checkup();
        self.nodes += 1;

        if self.evaluator.is_draw(&self.board) {
            return DRAW_SCORE;
        }
        if ply >= MAX_PLY {
            return self.evaluator.evaluate(&self.board);
        }

        let ply_i = ply as i32;
        if alpha >= MATE_SCORE - ply_i {
            return alpha;
        }
        if beta <= -MATE_SCORE + ply_i {
            return beta;
        }

        let in_check = self.board.is_check();
        let mut best_score = MIN_SCORE;

        if !in_check {
            let stand_pat = self.evaluator.evaluate(&self.board);
            if stand_pat >= beta {
                return stand_pat;
            }
            // Delta pruning: even a huge material swing cannot reach alpha.
            if stand_pat < alpha - DELTA_MARGIN {
                return stand_pat;
            }
            best_score = stand_pat;
            if stand_pat > alpha {
                alpha = stand_pat;
            }
        }

        let moves = if in_check {
            // Every evasion is searched, quiet or not.
            self.board.legal_moves()
        } else {
            self.board.legal_captures()
        };

        if in_check && moves.is_empty() {
            return -MATE_SCORE + ply_i;
        }

        let scored = self.score_moves_quiescence(&moves, in_check);

        for &(mv, _) in scored.iter() {
            if self.stopped() {
                return 0;
            }

            self.make(mv);
            let score = -self.quiescence(ply + 1, -beta, -alpha);
            self.undo(mv);

            if score >= beta {
                return score;
            }
            if score > best_score {
                best_score = score;
                if score > alpha {
                    alpha = score;
                }
            }
        }

        best_score
    }
}
