//! The channel-alignment dialog: four nudge commands and a cancel, driven by whatever host owns the images.
//!
//! The host plugs in through three small traits. [`ActiveImageProvider`] hands over the image currently being
//! displayed (if any), [`DisplaySink`] takes back either the shifted replacement or the untouched original, and
//! [`ErrorLogger`] receives anything that went wrong while handling a command. Nothing here knows about windows or
//! widgets.

use std::{error::Error, fmt::Display, str::FromStr};

use log::{debug, error, trace};
use snafu::{Snafu, ensure};

use crate::{
    grid::PixelGrid,
    settings::AlignSettings,
    shift::{ShiftDirection, shift},
};

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum AlignError {
    #[snafu(display("Only 32-bit floating-point images can be shifted (this one is {bit_depth}-bit)"))]
    NotFloatingPoint { bit_depth: u8 },
}

#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(display("Unknown command \"{command}\""))]
pub struct ParseCommandError {
    command: String,
}

/// The pixel data of a host image. Only float data can be shifted; anything else is carried along so the host can
/// get it back untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum HostPixels {
    Float32(PixelGrid),
    Other {
        bit_depth: u8,
        width: usize,
        height: usize,
    },
}

impl HostPixels {
    pub fn dimensions(&self) -> (usize, usize) {
        match self {
            Self::Float32(grid) => grid.dimensions(),
            Self::Other { width, height, .. } => (*width, *height),
        }
    }

    pub fn bit_depth(&self) -> u8 {
        match self {
            Self::Float32(_) => 32,
            Self::Other { bit_depth, .. } => *bit_depth,
        }
    }
}

/// An image as the host sees it: pixel data plus whatever display state (lookup table, color model) goes with it.
/// The display state is never inspected, only carried over to the shifted image.
#[derive(Debug, Clone, PartialEq)]
pub struct HostImage<M> {
    pub pixels: HostPixels,
    pub display: M,
}

impl<M> HostImage<M> {
    pub fn new(grid: PixelGrid, display: M) -> Self {
        Self {
            pixels: HostPixels::Float32(grid),
            display,
        }
    }
}

pub trait ActiveImageProvider<M> {
    /// Take the image the user is currently looking at, or `None` if there isn't one.
    fn take_active(&mut self) -> Option<HostImage<M>>;
}

pub trait DisplaySink<M> {
    /// Replace the displayed image with `image` and redraw it.
    fn show(&mut self, image: HostImage<M>);

    /// Give back an image taken from the provider whose pixels didn't change. No redraw is needed.
    fn restore(&mut self, image: HostImage<M>);
}

pub trait ErrorLogger {
    fn log_error(&mut self, message: &str, error: &dyn Error);
}

/// Shift a host image, keeping its display state. Fails without touching anything if the image isn't float data.
pub fn apply<M>(
    image: HostImage<M>,
    direction: ShiftDirection,
    offset: usize,
) -> Result<HostImage<M>, (AlignError, HostImage<M>)> {
    let grid = match image.pixels {
        HostPixels::Float32(grid) => grid,
        other => {
            let bit_depth = other.bit_depth();
            return Err((
                AlignError::NotFloatingPoint { bit_depth },
                HostImage {
                    pixels: other,
                    display: image.display,
                },
            ));
        }
    };

    debug!(
        "shifting {}x{} image {direction} by {offset}",
        grid.width(),
        grid.height()
    );
    Ok(HostImage {
        pixels: HostPixels::Float32(shift(grid, direction, offset)),
        display: image.display,
    })
}

/// Shift whatever grid is currently active. Having no active grid is not an error; there's just nothing to do.
pub fn shift_active(
    grid: Option<PixelGrid>,
    direction: ShiftDirection,
    offset: usize,
) -> Option<PixelGrid> {
    grid.map(|grid| shift(grid, direction, offset))
}

/// Check that an image can be shifted before committing to anything.
pub fn ensure_float(pixels: &HostPixels) -> Result<(), AlignError> {
    let bit_depth = pixels.bit_depth();
    ensure!(
        matches!(pixels, HostPixels::Float32(_)),
        NotFloatingPointSnafu { bit_depth }
    );
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum AlignCommand {
    Up,
    Down,
    Left,
    Right,
    Cancel,
}

impl AlignCommand {
    pub const ALL: [AlignCommand; 5] = [
        Self::Up,
        Self::Down,
        Self::Left,
        Self::Right,
        Self::Cancel,
    ];

    pub fn direction(&self) -> Option<ShiftDirection> {
        match self {
            Self::Up => Some(ShiftDirection::Up),
            Self::Down => Some(ShiftDirection::Down),
            Self::Left => Some(ShiftDirection::Left),
            Self::Right => Some(ShiftDirection::Right),
            Self::Cancel => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self.direction() {
            Some(direction) => direction.name(),
            None => "cancel",
        }
    }
}

impl From<ShiftDirection> for AlignCommand {
    fn from(direction: ShiftDirection) -> Self {
        match direction {
            ShiftDirection::Up => Self::Up,
            ShiftDirection::Down => Self::Down,
            ShiftDirection::Left => Self::Left,
            ShiftDirection::Right => Self::Right,
        }
    }
}

impl Display for AlignCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AlignCommand {
    type Err = ParseCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|command| command.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseCommandError {
                command: trimmed.to_owned(),
            })
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AlignOutcome {
    /// The active image was shifted and handed to the display.
    Shifted,
    /// There was no active image, so nothing happened.
    NoActiveImage,
    /// The command failed; the error went to the logger and the image was restored unchanged.
    Failed,
    /// The dialog was hidden.
    Hidden,
    /// The dialog is hidden and doesn't respond to commands.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct AlignDialog {
    settings: AlignSettings,
    visible: bool,
    displacement: (isize, isize),
}

impl AlignDialog {
    pub fn new(settings: AlignSettings) -> Self {
        Self {
            settings,
            visible: true,
            displacement: (0, 0),
        }
    }

    pub fn settings(&self) -> &AlignSettings {
        &self.settings
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn show(&mut self) {
        trace!("align dialog shown");
        self.visible = true;
    }

    /// Net `(dx, dy)` applied by every successful shift since the dialog was created or last reset.
    pub fn displacement(&self) -> (isize, isize) {
        self.displacement
    }

    pub fn reset_displacement(&mut self) {
        self.displacement = (0, 0);
    }

    pub fn handle<M>(
        &mut self,
        command: AlignCommand,
        provider: &mut impl ActiveImageProvider<M>,
        sink: &mut impl DisplaySink<M>,
        logger: &mut impl ErrorLogger,
    ) -> AlignOutcome {
        if !self.visible {
            trace!("ignoring {command}: dialog is hidden");
            return AlignOutcome::Ignored;
        }

        let Some(direction) = command.direction() else {
            trace!("align dialog hidden");
            self.visible = false;
            return AlignOutcome::Hidden;
        };

        let Some(image) = provider.take_active() else {
            debug!("no active image to shift {direction}");
            return AlignOutcome::NoActiveImage;
        };

        let offset = self.settings.offset;
        match apply(image, direction, offset) {
            Ok(shifted) => {
                sink.show(shifted);
                let (dx, dy) = direction.displacement(offset);
                self.displacement.0 = self.displacement.0.saturating_add(dx);
                self.displacement.1 = self.displacement.1.saturating_add(dy);
                AlignOutcome::Shifted
            }
            Err((err, untouched)) => {
                error!("could not shift image {direction}: {err}");
                logger.log_error(&format!("Error shifting image {direction}"), &err);
                sink.restore(untouched);
                AlignOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Lut(&'static str);

    struct Slot(Option<HostImage<Lut>>);

    impl ActiveImageProvider<Lut> for Slot {
        fn take_active(&mut self) -> Option<HostImage<Lut>> {
            self.0.take()
        }
    }

    #[derive(Default)]
    struct Screen {
        shown: Option<HostImage<Lut>>,
        redraws: usize,
    }

    impl DisplaySink<Lut> for Screen {
        fn show(&mut self, image: HostImage<Lut>) {
            self.redraws += 1;
            self.shown = Some(image);
        }

        fn restore(&mut self, image: HostImage<Lut>) {
            self.shown = Some(image);
        }
    }

    #[derive(Default)]
    struct Log {
        errors: Vec<String>,
    }

    impl ErrorLogger for Log {
        fn log_error(&mut self, message: &str, error: &dyn Error) {
            self.errors.push(format!("{message}: {error}"));
        }
    }

    struct Host {
        active: Slot,
        screen: Screen,
        log: Log,
    }

    impl Host {
        fn new(active: Option<HostImage<Lut>>) -> Self {
            Self {
                active: Slot(active),
                screen: Screen::default(),
                log: Log::default(),
            }
        }

        fn press(&mut self, dialog: &mut AlignDialog, command: AlignCommand) -> AlignOutcome {
            let outcome = dialog.handle(command, &mut self.active, &mut self.screen, &mut self.log);
            // Whatever was put on screen becomes the active image for the next press.
            if let Some(shown) = self.screen.shown.take() {
                self.active.0 = Some(shown);
            }
            outcome
        }

        fn active(&self) -> Option<&HostImage<Lut>> {
            self.active.0.as_ref()
        }
    }

    fn sample_image() -> HostImage<Lut> {
        let rows: [[f32; 3]; 3] = [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
        HostImage::new(PixelGrid::from_rows(&rows).unwrap(), Lut("fire"))
    }

    fn active_grid(host: &Host) -> &PixelGrid {
        match &host.active().unwrap().pixels {
            HostPixels::Float32(grid) => grid,
            other => panic!("expected float pixels, got {other:?}"),
        }
    }

    #[test]
    fn up_command_shifts_and_keeps_lut() {
        let mut host = Host::new(Some(sample_image()));
        let mut dialog = AlignDialog::new(AlignSettings::default());

        assert_eq!(host.press(&mut dialog, AlignCommand::Up), AlignOutcome::Shifted);
        assert_eq!(host.screen.redraws, 1);
        assert_eq!(host.active().unwrap().display, Lut("fire"));
        let rows: [[f32; 3]; 3] = [[4.0, 5.0, 6.0], [7.0, 8.0, 9.0], [0.0, 0.0, 0.0]];
        assert_eq!(active_grid(&host), &PixelGrid::from_rows(&rows).unwrap());
    }

    #[test]
    fn no_active_image_is_a_quiet_no_op() {
        let mut host = Host::new(None);
        let mut dialog = AlignDialog::new(AlignSettings::default());

        for command in [
            AlignCommand::Up,
            AlignCommand::Down,
            AlignCommand::Left,
            AlignCommand::Right,
        ] {
            assert_eq!(host.press(&mut dialog, command), AlignOutcome::NoActiveImage);
        }
        assert_eq!(host.screen.redraws, 0);
        assert!(host.log.errors.is_empty());
        assert_eq!(dialog.displacement(), (0, 0));
    }

    #[test]
    fn non_float_image_is_logged_and_handed_back() {
        let original = HostImage {
            pixels: HostPixels::Other {
                bit_depth: 16,
                width: 4,
                height: 2,
            },
            display: Lut("grays"),
        };
        let mut host = Host::new(Some(original.clone()));
        let mut dialog = AlignDialog::new(AlignSettings::default());

        assert_eq!(host.press(&mut dialog, AlignCommand::Left), AlignOutcome::Failed);
        assert_eq!(host.active(), Some(&original));
        assert_eq!(host.screen.redraws, 0);
        assert_eq!(host.log.errors.len(), 1);
        assert!(host.log.errors[0].contains("16-bit"), "{}", host.log.errors[0]);
        assert!(dialog.is_visible());
        assert_eq!(dialog.displacement(), (0, 0));
    }

    #[test]
    fn cancel_hides_and_silences_the_dialog() {
        let mut host = Host::new(Some(sample_image()));
        let mut dialog = AlignDialog::new(AlignSettings::default());

        assert_eq!(host.press(&mut dialog, AlignCommand::Cancel), AlignOutcome::Hidden);
        assert!(!dialog.is_visible());
        assert_eq!(host.press(&mut dialog, AlignCommand::Right), AlignOutcome::Ignored);
        assert_eq!(host.active(), Some(&sample_image()));
        assert_eq!(host.screen.redraws, 0);

        dialog.show();
        assert_eq!(host.press(&mut dialog, AlignCommand::Right), AlignOutcome::Shifted);
    }

    #[test]
    fn tracks_net_displacement() {
        let mut host = Host::new(Some(HostImage::new(
            PixelGrid::zeroed(16, 16).unwrap(),
            Lut("grays"),
        )));
        let mut dialog = AlignDialog::new(AlignSettings { offset: 2 });

        for command in [
            AlignCommand::Right,
            AlignCommand::Right,
            AlignCommand::Up,
            AlignCommand::Left,
            AlignCommand::Down,
            AlignCommand::Down,
        ] {
            assert_eq!(host.press(&mut dialog, command), AlignOutcome::Shifted);
        }
        assert_eq!(dialog.settings().offset, 2);
        assert_eq!(dialog.displacement(), (2, 2));
        assert_eq!(host.screen.redraws, 6);

        dialog.reset_displacement();
        assert_eq!(dialog.displacement(), (0, 0));
    }

    #[test]
    fn shift_active_without_grid_does_nothing() {
        assert_eq!(shift_active(None, ShiftDirection::Up, 1), None);
        let grid = PixelGrid::from_fn(2, 2, |x, y| (x + y) as f32).unwrap();
        assert_eq!(
            shift_active(Some(grid.clone()), ShiftDirection::Up, 0),
            Some(grid)
        );
    }

    #[test]
    fn ensure_float_checks_pixel_type() {
        assert_eq!(
            ensure_float(&HostPixels::Float32(PixelGrid::zeroed(1, 1).unwrap())),
            Ok(())
        );
        assert_eq!(
            ensure_float(&HostPixels::Other {
                bit_depth: 8,
                width: 1,
                height: 1
            }),
            Err(AlignError::NotFloatingPoint { bit_depth: 8 })
        );
    }

    #[test]
    fn parses_commands() {
        assert_eq!("cancel".parse(), Ok(AlignCommand::Cancel));
        assert_eq!(" Left\n".parse(), Ok(AlignCommand::Left));
        assert!("nudge".parse::<AlignCommand>().is_err());
        for command in AlignCommand::ALL {
            assert_eq!(command.to_string().parse(), Ok(command));
        }
        for direction in ShiftDirection::ALL {
            assert_eq!(AlignCommand::from(direction).direction(), Some(direction));
        }
    }
}
