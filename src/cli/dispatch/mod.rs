use crate::cli::actions::Action;
use anyhow::Result;

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        issuer_url: matches
            .get_one("issuer-url")
            .map(|s: &String| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --issuer-url"))?,
        verification_key: matches
            .get_one("verification-key")
            .map(|s: &String| s.to_string()),
    })
}
