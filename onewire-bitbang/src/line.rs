/// Contract for the single open-drain data line.
///
/// An implementation typically emulates open-drain behavior by switching
/// the pin direction: output-low to drive, input-with-pullup to release.
/// The line must be in the released state before any master primitive runs,
/// and the caller owns the line exclusively for the life of the session;
/// two drivers on one physical line is undefined at the electrical level.
pub trait BusLine {
    /// Error type of the underlying pin operations.
    type Error;

    /// Actively pull the line low.
    fn drive_low(&mut self) -> Result<(), Self::Error>;

    /// Stop driving; the external pullup (or a slave) now owns the level.
    fn release(&mut self) -> Result<(), Self::Error>;

    /// Sample the instantaneous line level. `true` means low.
    fn is_low(&mut self) -> Result<bool, Self::Error>;
}
