//! CLI definitions for phAI.

use crate::config::AppConfig;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// phAI CLI.
#[derive(Debug, Parser)]
#[command(name = "phai")]
#[command(about = "Walk a photo library in the browser and describe every photo with a local vision model")]
#[command(version)]
pub struct Cli {
    /// Configuration file path (default: platform config dir)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub browser: BrowserArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Default, Args)]
pub struct BrowserArgs {
    /// DevTools port of the browser to drive
    #[arg(long, global = true)]
    pub cdp_port: Option<u16>,

    /// Launch the browser instead of attaching to a running one
    #[arg(long, global = true)]
    pub launch: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan photos starting at the current page
    Scan {
        /// Number of photos to process
        #[arg(short = 'n', long)]
        max_items: Option<u32>,

        /// Ollama endpoint, e.g. localhost:11434
        #[arg(long, env = "PHAI_ENDPOINT")]
        endpoint: Option<String>,

        /// Vision model name
        #[arg(long, env = "PHAI_MODEL")]
        model: Option<String>,

        /// Prompt text (overrides the prompt file)
        #[arg(long)]
        prompt: Option<String>,

        /// Reference image sent before every photo
        #[arg(long)]
        reference_image: Option<PathBuf>,

        /// Skip image descriptions
        #[arg(long)]
        no_describe: bool,
    },

    /// Serve the local HTTP API
    Serve {
        /// API port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Save every thumbnail on the current page
    Harvest {
        /// Output directory
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Randomize requested sizes
        #[arg(long)]
        jitter: bool,
    },
}

impl Cli {
    /// Apply command-line values on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(port) = self.browser.cdp_port {
            config.browser.cdp_port = port;
        }
        if self.browser.launch {
            config.browser.launch = true;
        }

        match &self.command {
            Commands::Scan {
                max_items,
                endpoint,
                model,
                prompt,
                reference_image,
                no_describe,
            } => {
                if let Some(n) = max_items {
                    config.scan.max_items = *n;
                }
                if let Some(endpoint) = endpoint {
                    config.inference.endpoint = endpoint.clone();
                }
                if let Some(model) = model {
                    config.inference.model = model.clone();
                }
                if let Some(prompt) = prompt {
                    config.inference.prompt = prompt.clone();
                    config.inference.prompt_file = None;
                }
                if let Some(path) = reference_image {
                    config.inference.reference_image = Some(path.clone());
                }
                if *no_describe {
                    config.inference.enabled = false;
                }
            }
            Commands::Serve { port } => {
                if let Some(port) = port {
                    config.api.port = *port;
                }
            }
            Commands::Harvest { out, jitter } => {
                if let Some(out) = out {
                    config.harvest.output_dir = out.clone();
                }
                if *jitter {
                    config.harvest.jitter = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_overrides() {
        let cli = Cli::try_parse_from([
            "phai",
            "scan",
            "-n",
            "3",
            "--endpoint",
            "gpu.lan:11434",
            "--prompt",
            "Count the dogs",
            "--cdp-port",
            "9333",
        ])
        .unwrap();
        let mut config = AppConfig::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.scan.max_items, 3);
        assert_eq!(config.inference.endpoint, "gpu.lan:11434");
        assert_eq!(config.inference.prompt, "Count the dogs");
        assert!(config.inference.prompt_file.is_none());
        assert_eq!(config.browser.cdp_port, 9333);
        assert_eq!(config.inference.model, "llava:7b");
    }

    #[test]
    fn test_serve_and_harvest_overrides() {
        let mut config = AppConfig::default();
        Cli::try_parse_from(["phai", "serve", "--port", "40000"])
            .unwrap()
            .apply_overrides(&mut config);
        assert_eq!(config.api.port, 40000);

        Cli::try_parse_from(["phai", "harvest", "--out", "/tmp/thumbs", "--jitter", "--launch"])
            .unwrap()
            .apply_overrides(&mut config);
        assert_eq!(config.harvest.output_dir, PathBuf::from("/tmp/thumbs"));
        assert!(config.harvest.jitter);
        assert!(config.browser.launch);
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["phai"]).is_err());
    }
}
