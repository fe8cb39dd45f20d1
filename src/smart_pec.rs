//! Per-register PEC policy.
//!
//! The status/flag registers (0x50..=0x57) never answer with a PEC byte, and the
//! extended commands (0x58 and up) have not been verified to do so. For those the
//! PEC is forced off for the duration of a single access, whatever the session says.

use core::ops::{Deref, DerefMut};

use crate::Bq4050;

const STATUS_FIRST: u8 = 0x50;
const STATUS_LAST: u8 = 0x57;
const EXTENDED_FIRST: u8 = 0x58;

/// Decides whether PEC should be used for one access to `command`
pub fn effective_pec(command: u8, nominal: bool) -> bool {
    match command {
        STATUS_FIRST..=STATUS_LAST => false,
        EXTENDED_FIRST..=u8::MAX => false,
        _ => nominal,
    }
}

/// Overrides the session PEC flag while alive and puts the nominal value back on drop,
/// so the flag is restored on error returns and when a pending future is dropped
pub(crate) struct PecOverride<'a, T, D> {
    gauge: &'a mut Bq4050<T, D>,
    nominal: bool,
}

impl<'a, T, D> PecOverride<'a, T, D> {
    pub(crate) fn new(gauge: &'a mut Bq4050<T, D>, command: u8) -> Self {
        let nominal = gauge.pec_enabled;
        gauge.pec_enabled = effective_pec(command, nominal);

        Self { gauge, nominal }
    }
}

impl<T, D> Deref for PecOverride<'_, T, D> {
    type Target = Bq4050<T, D>;

    fn deref(&self) -> &Self::Target {
        self.gauge
    }
}

impl<T, D> DerefMut for PecOverride<'_, T, D> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.gauge
    }
}

impl<T, D> Drop for PecOverride<'_, T, D> {
    fn drop(&mut self) {
        self.gauge.pec_enabled = self.nominal;
    }
}
