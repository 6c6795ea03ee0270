use clap::Parser;

mod app;

use app::Settings;

fn main() -> anyhow::Result<()> {
    let settings = Settings::parse();
    app::logging::setup_logging(settings.verbose);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    rt.block_on(app::run(settings))
}
