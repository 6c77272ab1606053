//! Minimal interactive driver: position setup, timed search, perft and
//! display. Full UCI option handling lives outside this crate.

use std::io::{self, BufRead, Write};
use std::time::Instant;

use meridian::board::Board;
use meridian::logger::init_logging;
use meridian::moves::perft::{perft, perft_divide};
use meridian::Engine;

const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

fn main() {
    init_logging("logs/meridian.log", "meridian=info");

    let mut engine = match Engine::new() {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("failed to start: {}", err);
            return;
        }
    };

    let stdin = io::stdin();
    print_prompt();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l.trim().to_string(),
            Err(_) => break,
        };
        if line.is_empty() {
            print_prompt();
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts[0] {
            "quit" | "exit" => break,

            "position" => handle_position(&mut engine, &parts),

            "go" => {
                let time_ms = parts
                    .get(1)
                    .and_then(|t| t.parse::<u64>().ok())
                    .unwrap_or(1000);
                let start = Instant::now();
                match engine.search(time_ms, false) {
                    Some(best) => {
                        let score = engine.best_move_score().unwrap_or(0);
                        let pv: Vec<String> = engine
                            .principal_variation()
                            .iter()
                            .map(|m| m.to_uci())
                            .collect();
                        println!(
                            "best {} score {} nodes {} time {}ms",
                            best.to_uci(),
                            score,
                            engine.nodes_searched(),
                            start.elapsed().as_millis()
                        );
                        println!("pv {}", pv.join(" "));
                    }
                    None => println!("no legal moves"),
                }
            }

            "perft" => {
                let depth = parts
                    .get(1)
                    .and_then(|d| d.parse::<u32>().ok())
                    .unwrap_or(5);
                let mut board = engine.board().clone();
                let start = Instant::now();
                let nodes = perft(&mut board, depth);
                let secs = start.elapsed().as_secs_f64().max(1e-9);
                println!(
                    "perft {} = {} ({:.0} nps)",
                    depth,
                    nodes,
                    nodes as f64 / secs
                );
            }

            "divide" => {
                let depth = parts
                    .get(1)
                    .and_then(|d| d.parse::<u32>().ok())
                    .unwrap_or(2);
                let mut board = engine.board().clone();
                for (mv, nodes) in perft_divide(&mut board, depth) {
                    println!("{}: {}", mv.to_uci(), nodes);
                }
            }

            "d" | "display" => print_diagram(engine.board()),

            "fen" => println!("{}", engine.board().to_fen()),

            _ => println!("commands: position | go [ms] | perft [d] | divide [d] | d | fen | quit"),
        }
        print_prompt();
    }
}

fn print_prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

/// `position startpos [moves ...]` or `position fen <fen> [moves ...]`.
fn handle_position(engine: &mut Engine, parts: &[&str]) {
    let (fen, move_start) = if parts.get(1) == Some(&"startpos") {
        (START_FEN.to_string(), 2)
    } else if parts.get(1) == Some(&"fen") {
        let moves_at = parts
            .iter()
            .position(|&p| p == "moves")
            .unwrap_or(parts.len());
        (parts[2..moves_at].join(" "), moves_at)
    } else {
        println!("usage: position startpos|fen <fen> [moves ...]");
        return;
    };

    let moves: Vec<&str> = if parts.get(move_start) == Some(&"moves") {
        parts[move_start + 1..].to_vec()
    } else {
        Vec::new()
    };

    if let Err(err) = engine.set_position(&fen, &moves) {
        println!("rejected: {}", err);
    }
}

// The board Display impl prints FEN; humans get a diagram.
fn print_diagram(board: &Board) {
    for rank in (0..8u8).rev() {
        print!("{} ", rank + 1);
        for file in 0..8u8 {
            let sq = meridian::square::Square::from_file_rank(file, rank);
            let glyph = match board.piece_at(sq) {
                Some((color, kind)) => {
                    let letters = ['p', 'n', 'b', 'r', 'q', 'k'];
                    let c = letters[kind as usize];
                    if color == meridian::board::Color::White {
                        c.to_ascii_uppercase()
                    } else {
                        c
                    }
                }
                None => '.',
            };
            print!("{} ", glyph);
        }
        println!();
    }
    println!("  a b c d e f g h");
}
