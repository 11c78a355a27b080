use std::convert::Infallible;

use fingerspan::config::{Config, SourceConfig};
use fingerspan::detector::subprocess::SubprocessDetector;
use fingerspan::display::GuiDisplay;
use fingerspan::gui;
use fingerspan::pipeline::CaptureLoop;
use fingerspan::resolution::Resolution;
use fingerspan::video::still::StillImage;
use fingerspan::video::webcam::{Webcam, WebcamOptions};
use fingerspan::video::FrameSource;

fn main() -> anyhow::Result<Infallible> {
    fingerspan::init_logger!();

    let config = Config::from_env()?;
    log::info!("{config:?}");

    gui::run(move || run(config))
}

fn run(config: Config) -> anyhow::Result<()> {
    let mut source = open_source(&config.source)?;
    let mut detector = SubprocessDetector::spawn(&config.detector_command, config.detector)?;

    let summary =
        CaptureLoop::from_config(&config).run(&mut source, &mut detector, &mut GuiDisplay::new())?;
    log::info!(
        "processed {} frames ({} failed reads)",
        summary.frames,
        summary.failed_reads
    );
    Ok(())
}

fn open_source(config: &SourceConfig) -> anyhow::Result<Box<dyn FrameSource>> {
    match config {
        SourceConfig::Webcam { name } => {
            let mut options = WebcamOptions::default()
                .resolution(Resolution::RES_720P)
                .fps(30);
            if let Some(name) = name {
                options = options.name(name);
            }
            let webcam = Webcam::open(options)?;
            log::info!("capturing at {}", webcam.resolution());
            Ok(Box::new(webcam))
        }
        SourceConfig::StillImage(path) => Ok(Box::new(StillImage::load(path)?)),
    }
}
