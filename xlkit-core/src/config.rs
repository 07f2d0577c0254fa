//! Host limits the marshalling layer enforces. They depend on which Excel the
//! add-in targets, so they are installed once at startup instead of being baked
//! into the operand code.

use std::sync::OnceLock;

/// The one-byte length prefix of an `XLOPER` string caps it at 255 bytes no matter what the
/// host itself would accept.
pub const MAX_STRING_PREFIX: usize = u8::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostLimits {
    /// Longest string written into an operand, in bytes
    pub max_string_len: usize,
    pub max_rows: usize,
    pub max_cols: usize,
    /// Most arguments a single Excel4v callback accepts
    pub max_call_args: usize,
}

impl HostLimits {
    /// Excel 4 through 2003: 256 columns, 30 argument callbacks.
    pub const EXCEL_4: HostLimits = HostLimits {
        max_string_len: 255,
        max_rows: u16::MAX as usize,
        max_cols: 256,
        max_call_args: 30,
    };

    /// Excel 2007+ hosting the legacy API. Rows stay bounded by the 16-bit array header.
    pub const EXCEL_2007: HostLimits = HostLimits {
        max_string_len: 255,
        max_rows: u16::MAX as usize,
        max_cols: 16_384,
        max_call_args: 30,
    };

    pub fn with_max_string_len(mut self, len: usize) -> HostLimits {
        self.max_string_len = len.min(MAX_STRING_PREFIX);
        self
    }

    pub fn with_max_dims(mut self, rows: usize, cols: usize) -> HostLimits {
        self.max_rows = rows.min(u16::MAX as usize);
        self.max_cols = cols.min(u16::MAX as usize);
        self
    }
}

impl Default for HostLimits {
    fn default() -> HostLimits {
        HostLimits::EXCEL_4
    }
}

static LIMITS: OnceLock<HostLimits> = OnceLock::new();

/// Install the limits for this process. Only the first call wins; later calls get their
/// limits handed back.
pub fn install(limits: HostLimits) -> Result<(), HostLimits> {
    let limits = limits
        .with_max_string_len(limits.max_string_len)
        .with_max_dims(limits.max_rows, limits.max_cols);
    LIMITS.set(limits)
}

/// Active limits, `HostLimits::EXCEL_4` unless something else was installed
pub fn limits() -> &'static HostLimits {
    LIMITS.get_or_init(HostLimits::default)
}
