//! Blocks command: block activity of a game before a point in time.

use std::fmt::Write;

use anyhow::Result;
use hlo_core::BlocksUntil;
use hlo_db::Database;

use super::util::{load_game, parse_datetime};

pub fn format_blocks(blocks: &BlocksUntil) -> String {
    let mut output = String::new();
    for (title, list) in [
        ("Placed Blocks", &blocks.placed),
        ("Destroyed Blocks", &blocks.destroyed),
        ("Present Blocks", &blocks.present),
    ] {
        writeln!(output, "{title}").unwrap();
        for block in list {
            writeln!(output, " - {block}").unwrap();
        }
    }
    output
}

pub fn run(db: &Database, id: i64, until: &str) -> Result<()> {
    let until = parse_datetime(until)?;
    let game = load_game(db, id)?;
    print!("{}", format_blocks(&game.log.blocks_until(until)));
    Ok(())
}
