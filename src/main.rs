use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{error, info};
use monscan::cli::Cli;
use monscan::{escalate_interrupts, shutdown_channel, DirectoryFrameSource, FrameSource, ScanScheduler, ScheduleConfig, ScreenshotWriter};
use monscan_core::MonsterSystemConfig;
use monscan_cv::traits::TemplateMatchable;
use monscan_cv::{ImageMatcher, MonsterDetector, TemplateLoader};

fn load_config(cli: &Cli) -> Result<MonsterSystemConfig> {
    let mut config = match &cli.config {
        Some(path) => MonsterSystemConfig::load(path)?,
        None => MonsterSystemConfig::default(),
    };
    cli.apply(&mut config);
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn open_source(cli: &Cli) -> Result<Box<dyn FrameSource>> {
    if let Some(dir) = &cli.frames {
        return Ok(Box::new(DirectoryFrameSource::open(dir)?));
    }

    #[cfg(feature = "screen-capture")]
    {
        if cli.screen {
            return Ok(Box::new(monscan::ScreenFrameSource::primary()?));
        }
    }

    let hint = if cfg!(feature = "screen-capture") {
        "pass --screen or --frames <DIR>"
    } else {
        "pass --frames <DIR>; screen capture needs a build with `--features screen-capture`"
    };
    bail!("No frame source: {}", hint)
}

fn matcher(cli: &Cli) -> Box<dyn TemplateMatchable> {
    match cli.method.matching_method() {
        Some(method) => Box::new(ImageMatcher::new(method)),
        #[cfg(feature = "opencv")]
        None => Box::new(monscan_cv::OpenCvMatcher::new()),
        #[cfg(not(feature = "opencv"))]
        None => Box::new(ImageMatcher::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    if cli.dump_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let source = open_source(&cli)?;
    let detector = MonsterDetector::from_config(&config, &TemplateLoader::new(), matcher(&cli))?;
    info!(
        "Loaded {} templates in {} categories",
        detector.template_count(),
        detector.categories().iter().filter(|c| c.enabled).count()
    );

    let writer = ScreenshotWriter::new(&config.output_dir)?;
    let scheduler = ScanScheduler::new(source, detector, writer, ScheduleConfig::from_system(&config)?);

    let (stop, signal) = shutdown_channel();
    tokio::spawn(async move {
        match escalate_interrupts(tokio::signal::ctrl_c, stop).await {
            Ok(()) => std::process::exit(130),
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    let stats = scheduler.run(signal).await;
    println!("\nFinal statistics:\n{}", stats);

    Ok(())
}
