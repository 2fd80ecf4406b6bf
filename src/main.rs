use clap::Parser;
use std::env;

fn main() -> anyhow::Result<()> {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }

    pretty_env_logger::init();

    merge_new_videos::Args::parse().exec()
}
