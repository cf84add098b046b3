use std::path::PathBuf;

use clap::Args;

use cairn_core::text::{Lexicon, sanitize};

#[derive(Args, Debug)]
pub struct TokenizeArgs {
    /// Names to tokenize
    #[arg(required = true)]
    pub names: Vec<String>,

    /// Configuration overrides (.toml, .json, .yaml)
    #[arg(long, env = "CAIRN_CONFIG")]
    pub config: Option<PathBuf>,
}

pub fn run(args: TokenizeArgs) -> anyhow::Result<()> {
    let config = super::load_config(args.config.as_deref())?;
    let lexicon = Lexicon::from_config(&config);

    for name in &args.names {
        let tokens = lexicon.tokenize(name);
        let normalized = lexicon.normalized_name(&tokens);
        let sanitized = sanitize(&normalized);
        println!("{name}");
        println!("  tokens:     [{}]", tokens.join(", "));
        println!("  normalized: {normalized}");
        println!("  sanitized:  {sanitized}");
        if tokens.first().is_some_and(|t| lexicon.is_stop_token(t)) {
            println!("  note:       leading stop token");
        }
    }
    Ok(())
}
