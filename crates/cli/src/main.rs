// Stract is an open source web search engine.
// Copyright (C) 2024 Stract ApS
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use repmatch::{ParseParams, RobotsMatcher};
use tracing_subscriber::prelude::*;

/// Assess whether a URL is accessible to a user agent according to records
/// found in a local robots.txt file.
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Local path to a file containing robots.txt records.
    robots_path: PathBuf,

    /// User-agent token to be matched against the records, e.g. `Googlebot`.
    /// A comma-separated list checks whether any of the agents may fetch the
    /// URL.
    user_agents: String,

    /// URL to be matched against the records. Must be %-encoded according to
    /// RFC 3986.
    url: String,

    /// Reject typo spellings of directive names such as `disalow` or
    /// `user agent`.
    #[clap(long)]
    strict: bool,
}

fn run(args: &Args) -> Result<bool> {
    let robots = fs::read(&args.robots_path)
        .with_context(|| format!("Failed to read robots.txt: '{}'", args.robots_path.display()))?;

    let user_agents: Vec<&str> = args.user_agents.split(',').map(str::trim).collect();
    let mut matcher = RobotsMatcher::with_params(ParseParams {
        allow_frequent_typos: !args.strict,
    });

    // An empty URL never identifies a fetchable document.
    let allowed = !args.url.is_empty() && matcher.is_allowed(&robots, &user_agents, &args.url);

    println!(
        "user-agent '{}' with URI '{}': {}",
        args.user_agents,
        args.url,
        if allowed { "ALLOWED" } else { "DISALLOWED" }
    );

    Ok(allowed)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .finish()
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::from(2)
        }
    }
}
