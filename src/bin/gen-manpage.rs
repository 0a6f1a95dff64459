//! Man page generator for picprog
//!
//! Writes `picprog.1` plus one `picprog-<command>.1` page per subcommand.
//!
//! Usage: cargo run --bin gen-manpage -- [output-dir]

use clap::CommandFactory;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[path = "../cli.rs"]
mod cli;

#[allow(dead_code)]
#[path = "../programmers.rs"]
mod programmers;

fn render(cmd: clap::Command, dir: &Path, name: &str) -> io::Result<PathBuf> {
    let mut buffer = Vec::new();
    clap_mangen::Man::new(cmd).render(&mut buffer)?;
    let path = dir.join(format!("{name}.1"));
    fs::write(&path, buffer)?;
    Ok(path)
}

fn main() -> io::Result<()> {
    let output_dir = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("man"));
    fs::create_dir_all(&output_dir)?;

    let cmd = cli::Cli::command();
    let mut pages = vec![render(cmd.clone(), &output_dir, "picprog")?];
    for sub in cmd.get_subcommands().filter(|sub| !sub.is_hide_set()) {
        let name = format!("picprog-{}", sub.get_name());
        pages.push(render(sub.clone(), &output_dir, &name)?);
    }

    for page in &pages {
        println!("Generated {}", page.display());
    }
    println!("\nView with:  man -l {}", pages[0].display());
    println!("Install alongside a `cargo install --path .` build with:");
    println!("  mkdir -p ~/.local/share/man/man1");
    println!(
        "  cp {}/picprog*.1 ~/.local/share/man/man1/",
        output_dir.display()
    );

    Ok(())
}
