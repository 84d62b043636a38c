use std::{
    error::Error,
    fs,
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
};

use clap::{Arg, ArgAction, builder::PathBufValueParser, command};
use color_eyre::eyre::{Report, Result, WrapErr};
use console::{Term, style};
use image::{ColorType, DynamicImage, ImageBuffer, Rgb};
use log::{debug, info};
use rifret::{
    AlignCommand, AlignDialog, AlignOutcome, AlignSettings, HostImage, HostPixels, PixelGrid,
    align::{ActiveImageProvider, DisplaySink, ErrorLogger, ensure_float},
};

macro_rules! warn {
    ($dst:expr, $($arg:tt)*) => {
        writeln!(
            $dst,
            "{}",
            style(format!($($arg)*)).yellow()
        )
    }
}

/// The image being aligned. The display tag is the color type the file was loaded with, so the output can be written
/// back in a matching format.
type LoadedImage = HostImage<ColorType>;

struct ActiveSlot(Option<LoadedImage>);

impl ActiveImageProvider<ColorType> for ActiveSlot {
    fn take_active(&mut self) -> Option<LoadedImage> {
        self.0.take()
    }
}

struct Viewer {
    shown: Option<LoadedImage>,
    redraws: usize,
}

impl DisplaySink<ColorType> for Viewer {
    fn show(&mut self, image: LoadedImage) {
        self.redraws += 1;
        debug!("redraw #{} ({:?})", self.redraws, image.pixels.dimensions());
        self.shown = Some(image);
    }

    fn restore(&mut self, image: LoadedImage) {
        debug!("restoring unchanged image");
        self.shown = Some(image);
    }
}

struct TermLogger {
    term: Term,
    errors: usize,
}

impl ErrorLogger for TermLogger {
    fn log_error(&mut self, message: &str, error: &dyn Error) {
        self.errors += 1;
        // The dialog has already logged this through `log`; a failed write to the terminal isn't worth aborting over.
        let _ = warn!(self.term, "{message}: {error}");
        let _ = self.term.flush();
    }
}

struct Session {
    dialog: AlignDialog,
    active: ActiveSlot,
    viewer: Viewer,
    logger: TermLogger,
}

impl Session {
    fn press(&mut self, command: AlignCommand) -> AlignOutcome {
        let outcome = self.dialog.handle(
            command,
            &mut self.active,
            &mut self.viewer,
            &mut self.logger,
        );
        if let Some(shown) = self.viewer.shown.take() {
            self.active.0 = Some(shown);
        }
        outcome
    }

    fn run_interactive(&mut self, term: &mut Term) -> Result<()> {
        writeln!(
            term,
            "Commands: {}. End input or type \"cancel\" to finish.",
            AlignCommand::ALL.map(|command| command.name()).join(", ")
        )?;
        let stdin = io::stdin();
        let mut lines = stdin.lock().lines();
        while self.dialog.is_visible() {
            write!(term, "{} ", style(">").cyan())?;
            term.flush()?;
            let Some(line) = lines.next() else {
                break;
            };
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<AlignCommand>() {
                Ok(command) => {
                    let outcome = self.press(command);
                    let (dx, dy) = self.dialog.displacement();
                    writeln!(term, "{outcome:?} (net offset {dx}, {dy})")?;
                }
                Err(err) => warn!(term, "{err}")?,
            }
            term.flush()?;
        }
        Ok(())
    }
}

fn load_image(path: &Path, strict: bool) -> Result<(LoadedImage, DynamicImage)> {
    let img = image::open(path)
        .wrap_err_with(|| format!("Failed to open {}", path.to_string_lossy()))?;
    let color = img.color();
    let is_float = matches!(img, DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_));

    let pixels = if is_float || !strict {
        let luma = img.to_luma32f();
        let (width, height) = luma.dimensions();
        HostPixels::Float32(PixelGrid::new(
            width as usize,
            height as usize,
            luma.into_raw(),
        )?)
    } else {
        HostPixels::Other {
            bit_depth: color.bytes_per_pixel() / color.channel_count() * 8,
            width: img.width() as usize,
            height: img.height() as usize,
        }
    };

    Ok((
        HostImage {
            pixels,
            display: color,
        },
        img,
    ))
}

fn save_image(image: &LoadedImage, original: &DynamicImage, path: &Path) -> Result<()> {
    let grid = match &image.pixels {
        HostPixels::Float32(grid) => grid,
        HostPixels::Other { .. } => {
            // Nothing was shifted; write the input back as it was.
            return original
                .save(path)
                .wrap_err_with(|| format!("Failed to write {}", path.to_string_lossy()));
        }
    };

    // There's no single-channel float variant, so replicate the samples into RGB.
    let samples: Vec<f32> = grid.as_slice().iter().flat_map(|&v| [v, v, v]).collect();
    let rgb = ImageBuffer::<Rgb<f32>, Vec<f32>>::from_raw(
        grid.width() as u32,
        grid.height() as u32,
        samples,
    )
    .ok_or_else(|| Report::msg("Aligned image is too large to encode"))?;
    let rgb = DynamicImage::ImageRgb32F(rgb);

    let is_tiff = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("tif") || ext.eq_ignore_ascii_case("tiff"));
    let out = if is_tiff {
        rgb
    } else {
        info!(
            "{} can't store float samples; writing 16-bit (loaded as {:?})",
            path.to_string_lossy(),
            image.display
        );
        DynamicImage::ImageLuma16(rgb.to_luma16())
    };

    out.save(path)
        .wrap_err_with(|| format!("Failed to write {}", path.to_string_lossy()))
}

/// Returns `false` if the user (or the `--no-overwrite` flag) declined to overwrite an existing output file.
fn confirm_overwrite(term: &mut Term, output_path: &Path, overwrite: bool, no_overwrite: bool) -> Result<bool> {
    let output_path_metadata = fs::metadata(output_path);
    if output_path_metadata
        .as_ref()
        .is_ok_and(|metadata| metadata.is_dir())
    {
        return Err(Report::msg(format!(
            "Output path {} is a folder",
            output_path.as_os_str().to_string_lossy()
        )));
    }

    if output_path_metadata.is_err() || overwrite {
        return Ok(true);
    }

    if !term.is_term() || no_overwrite {
        return Ok(false);
    }

    loop {
        write!(
            term,
            "{} already exists. Overwrite? [y/N] ",
            output_path.as_os_str().to_string_lossy()
        )?;
        term.flush()?;
        let mut response = String::new();
        io::stdin().read_line(&mut response)?;
        response.make_ascii_lowercase();
        let response = response.trim();
        if response == "y" || response == "yes" {
            return Ok(true);
        } else if response == "n" || response == "no" || response.is_empty() {
            return Ok(false);
        }
    }
}

pub fn main() -> Result<()> {
    color_eyre::install()?;
    env_logger::init(); // Log to stderr (if you run with `RUST_LOG=debug`).

    let command = command!()
        .name("rifret-align")
        .about("Nudge a 32-bit float channel image by whole pixels, zero-filling the vacated edge.")
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .value_parser(PathBufValueParser::new())
                .help("Path to the image to align.")
                .required(true),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_parser(PathBufValueParser::new())
                .help("Path to write the aligned image to.")
                .long_help(
                    "Path to write the aligned image to. TIFF output keeps the 32-bit float \
                     samples; other formats are written as 16-bit grayscale.",
                )
                .required(true),
        )
        .arg(
            Arg::new("overwrite")
                .short('y')
                .long("overwrite")
                .action(ArgAction::SetTrue)
                .help(
                    "If the output file already exists, overwrite it without first prompting the \
                     user.",
                )
                .conflicts_with("no-overwrite"),
        )
        .arg(
            Arg::new("no-overwrite")
                .short('n')
                .long("no-overwrite")
                .action(ArgAction::SetTrue)
                .help(
                    "If the output file already exists, exit immediately without first prompting \
                     the user.",
                )
                .conflicts_with("overwrite"),
        )
        .arg(
            Arg::new("settings-path")
                .short('p')
                .long("settings-path")
                .value_parser(PathBufValueParser::new())
                .help("Path to a JSON alignment settings preset.")
                .conflicts_with("settings-json"),
        )
        .arg(
            Arg::new("settings-json")
                .short('j')
                .long("settings-json")
                .help("JSON string for an alignment settings preset.")
                .conflicts_with("settings-path")
                .value_parser(|json: &str| AlignSettings::from_json(json)),
        )
        .arg(
            Arg::new("offset")
                .long("offset")
                .help("Pixels to move per command. Overrides the preset.")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("shift")
                .short('s')
                .long("shift")
                .help("Commands to apply in order: up, down, left, right or cancel.")
                .long_help(
                    "Commands to apply in order: up, down, left, right or cancel. Separate them \
                     with commas or repeat the flag. Commands after a cancel are ignored.",
                )
                .action(ArgAction::Append)
                .value_delimiter(',')
                .value_parser(|command: &str| command.parse::<AlignCommand>()),
        )
        .arg(
            Arg::new("interactive")
                .long("interactive")
                .action(ArgAction::SetTrue)
                .help("Read commands from the terminal, one per line, after any --shift commands."),
        )
        .arg(
            Arg::new("strict")
                .long("strict")
                .action(ArgAction::SetTrue)
                .help("Refuse to shift images that aren't already 32-bit float instead of converting them."),
        );

    let matches = command.get_matches();

    let mut settings = if let Some(settings_path) = matches.get_one::<PathBuf>("settings-path") {
        AlignSettings::from_json(
            std::str::from_utf8(&fs::read(settings_path).wrap_err("Failed to open settings file")?)
                .wrap_err("Settings file is not valid UTF-8")?,
        )
        .wrap_err("Failed to parse settings file")?
    } else if let Some(settings) = matches.get_one::<AlignSettings>("settings-json") {
        settings.clone()
    } else {
        Default::default()
    };
    if let Some(offset) = matches.get_one::<usize>("offset") {
        settings.offset = *offset;
    }

    let input_path = matches
        .get_one::<PathBuf>("input")
        .expect("input path is present");
    let output_path = matches
        .get_one::<PathBuf>("output")
        .expect("output path is present");
    let overwrite = matches.get_flag("overwrite");
    let no_overwrite = matches.get_flag("no-overwrite");
    let interactive = matches.get_flag("interactive");
    let strict = matches.get_flag("strict");
    let commands: Vec<AlignCommand> = matches
        .get_many::<AlignCommand>("shift")
        .map(|commands| commands.copied().collect())
        .unwrap_or_default();

    let mut term = Term::buffered_stdout();

    if !confirm_overwrite(&mut term, output_path, overwrite, no_overwrite)? {
        term.write_line("Not overwriting existing file. Exiting.")?;
        term.flush()?;
        return Ok(());
    }

    let (image, original) = load_image(input_path, strict)?;
    let (width, height) = image.pixels.dimensions();
    info!(
        "loaded {}x{} {:?} image from {}",
        width,
        height,
        image.display,
        input_path.to_string_lossy()
    );
    if let Err(err) = ensure_float(&image.pixels) {
        warn!(term, "Warning: {err}. Shift commands will be rejected.")?;
    }

    let dialog = AlignDialog::new(settings);
    info!("shifting by {} px per command", dialog.settings().offset);
    let mut session = Session {
        dialog,
        active: ActiveSlot(Some(image)),
        viewer: Viewer {
            shown: None,
            redraws: 0,
        },
        logger: TermLogger {
            term: term.clone(),
            errors: 0,
        },
    };

    for command in commands {
        let outcome = session.press(command);
        debug!("{command}: {outcome:?}");
    }
    if interactive && session.dialog.is_visible() {
        session.run_interactive(&mut term)?;
    }

    let (dx, dy) = session.dialog.displacement();
    writeln!(
        term,
        "Net offset: {dx} px horizontal, {dy} px vertical ({} redraws, {} errors)",
        session.viewer.redraws, session.logger.errors
    )?;

    let image = session
        .active
        .0
        .take()
        .ok_or_else(|| Report::msg("Active image went missing during the session"))?;
    save_image(&image, &original, output_path)?;

    writeln!(term, "Wrote {}", output_path.as_os_str().to_string_lossy())?;
    term.flush()?;

    Ok(())
}
