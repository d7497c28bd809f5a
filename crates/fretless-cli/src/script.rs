//! A small textual driver for [`fretless_midi::GestureEncoder`], used to
//! demonstrate and manually exercise the library from the command line.
//!
//! One instruction per line:
//!
//! ```text
//! down <finger> <fnote> <poly> <velocity> <legato>
//! move <finger> <fnote> <velocity> <poly>
//! express <finger> <key> <val>
//! up <finger> <legato>
//! flush
//! ```
//!
//! Blank lines and lines starting with `#` are ignored.

use anyhow::{anyhow, Context, Result};
use fretless_midi::{ByteSink, Diagnostics, GestureEncoder};

pub fn run<S: ByteSink, D: Diagnostics>(encoder: &mut GestureEncoder<S, D>, script: &str) -> Result<()> {
    for (lineno, line) in script.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        run_line(encoder, line).with_context(|| format!("line {}: {line}", lineno + 1))?;
    }
    Ok(())
}

fn run_line<S: ByteSink, D: Diagnostics>(encoder: &mut GestureEncoder<S, D>, line: &str) -> Result<()> {
    let mut words = line.split_whitespace();
    let cmd = words.next().ok_or_else(|| anyhow!("empty instruction"))?;
    let rest: Vec<&str> = words.collect();

    match cmd {
        "down" => {
            let [finger, fnote, poly, velocity, legato] = parse5(&rest)?;
            encoder.begin_down(finger as usize);
            encoder.end_down(finger as usize, fnote, poly as usize, velocity, legato as i32);
        }
        "move" => {
            let [finger, fnote, velocity, poly] = parse4(&rest)?;
            encoder.move_finger(finger as usize, fnote, velocity, poly as i32);
        }
        "express" => {
            let [finger, key, val] = parse3(&rest)?;
            encoder.express(finger as usize, key as i32, val);
        }
        "up" => {
            let [finger, legato] = parse2(&rest)?;
            encoder.up(finger as usize, legato as i32);
        }
        "flush" => {
            encoder.flush();
        }
        other => return Err(anyhow!("unrecognized instruction {other:?}")),
    }
    Ok(())
}

fn parse_n<const N: usize>(rest: &[&str]) -> Result<[f32; N]> {
    if rest.len() != N {
        return Err(anyhow!("expected {N} arguments, got {}", rest.len()));
    }
    let mut out = [0.0f32; N];
    for (i, w) in rest.iter().enumerate() {
        out[i] = w.parse::<f32>().with_context(|| format!("bad number {w:?}"))?;
    }
    Ok(out)
}

fn parse2(rest: &[&str]) -> Result<[f32; 2]> {
    parse_n::<2>(rest)
}

fn parse3(rest: &[&str]) -> Result<[f32; 3]> {
    parse_n::<3>(rest)
}

fn parse4(rest: &[&str]) -> Result<[f32; 4]> {
    parse_n::<4>(rest)
}

fn parse5(rest: &[&str]) -> Result<[f32; 5]> {
    parse_n::<5>(rest)
}
