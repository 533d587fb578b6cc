//! Debug CLI (SPEC_FULL.md §A): reads a tiny textual scene description and
//! emits the SVG debug dump of spec §6. One directive per line:
//!
//! ```text
//! shape x y w h
//! junction x y
//! connector sx sy tx ty [orthogonal|polyline]
//! ```
//!
//! Blank lines and lines starting with `#` are ignored. This is a developer
//! tool for poking at the router from a shell, not a scene-file format the
//! library itself understands.

use clap::Parser;
use routewright::connector::{Endpoint, RoutingType};
use routewright::geometry::{Point, Polygon, Rect, Size};
use routewright::router::{Router, RouterMode};
use routewright::svg_debug::{self, DumpOptions};
use std::fs;
use std::io::{self, Read};

#[derive(Parser, Debug)]
struct Args {
    /// Scene description file; reads stdin when omitted.
    input: Option<String>,

    /// Where to write the SVG dump.
    #[arg(long, default_value = "output.svg")]
    output: String,

    /// Also draw each connector's pre-nudge route.
    #[arg(long)]
    show_raw_routes: bool,
}

fn main() -> io::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let src = match &args.input {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut s = String::new();
            io::stdin().read_to_string(&mut s)?;
            s
        }
    };

    let mut router = Router::new(RouterMode::Both);
    for (lineno, line) in src.lines().enumerate() {
        if let Err(e) = apply_directive(&mut router, line) {
            log::warn!("line {}: {e}", lineno + 1);
        }
    }
    router.process_transaction().expect("process_transaction");

    let mut file = fs::File::create(&args.output)?;
    svg_debug::dump(&router, DumpOptions { show_raw_routes: args.show_raw_routes }, &mut file).expect("svg dump");
    println!("wrote {}", args.output);
    Ok(())
}

fn apply_directive(router: &mut Router, line: &str) -> Result<(), String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(());
    }
    let mut tokens = line.split_whitespace();
    let keyword = tokens.next().ok_or("empty directive")?;
    let rest: Vec<&str> = tokens.collect();

    match keyword {
        "shape" => {
            let [x, y, w, h] = floats::<4>(&rest)?;
            router.add_shape(Polygon::rectangle(&Rect::new(Point::new(x, y), Size::new(w, h)))).map_err(|e| e.to_string())?;
        }
        "junction" => {
            let [x, y] = floats::<2>(&rest)?;
            router.add_junction(Point::new(x, y), false).map_err(|e| e.to_string())?;
        }
        "connector" => {
            let [sx, sy, tx, ty] = floats::<4>(&rest[..4])?;
            let routing_type = match rest.get(4).copied() {
                Some("polyline") => RoutingType::Polyline,
                _ => RoutingType::Orthogonal,
            };
            router.add_connector(Endpoint::Free(Point::new(sx, sy)), Endpoint::Free(Point::new(tx, ty)), routing_type).map_err(|e| e.to_string())?;
        }
        other => return Err(format!("unknown directive `{other}`")),
    }
    Ok(())
}

fn floats<const N: usize>(tokens: &[&str]) -> Result<[f64; N], String> {
    if tokens.len() < N {
        return Err(format!("expected {N} numbers, got {}", tokens.len()));
    }
    let mut out = [0.0; N];
    for i in 0..N {
        out[i] = tokens[i].parse::<f64>().map_err(|e| e.to_string())?;
    }
    Ok(out)
}
