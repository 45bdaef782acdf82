use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CELL_SIZE: f64 = 1.0;
pub const DEFAULT_MAX_DENOMINATOR: u32 = 100;

/// Dimensions of the unpadded grid, in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSpec {
    pub height: u64,
    pub width: u64,
}

/// Requested output size. Target dimensions take precedence over `scale`,
/// which is only consulted when neither target is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResizeTarget {
    pub target_height: Option<f64>,
    pub target_width: Option<f64>,
    pub scale: Option<f64>,
}

impl ResizeTarget {
    pub fn height(target_height: f64) -> Self {
        Self {
            target_height: Some(target_height),
            ..Self::default()
        }
    }

    pub fn width(target_width: f64) -> Self {
        Self {
            target_width: Some(target_width),
            ..Self::default()
        }
    }

    pub fn scale(scale: f64) -> Self {
        Self {
            scale: Some(scale),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Real-world size represented by one cell.
    pub cell_size: f64,
    /// Largest denominator considered for the resize fraction.
    pub max_denominator: u32,
    /// Emit trace events to the supplied sink. Never changes the result.
    pub debug: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE,
            max_denominator: DEFAULT_MAX_DENOMINATOR,
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchOverrides {
    pub cell_size: Option<f64>,
    pub max_denominator: Option<u32>,
    pub debug: Option<bool>,
}

pub fn resolve_search_config(overrides: SearchOverrides) -> SearchConfig {
    let mut cfg = SearchConfig::default();
    if let Some(cell_size) = overrides.cell_size {
        cfg.cell_size = cell_size;
    }
    if let Some(max_denominator) = overrides.max_denominator {
        cfg.max_denominator = max_denominator;
    }
    if let Some(debug) = overrides.debug {
        cfg.debug = debug;
    }
    cfg
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResizeRequest {
    pub grid: GridSpec,
    pub target: ResizeTarget,
    pub config: SearchConfig,
}

impl ResizeRequest {
    pub fn new(height: u64, width: u64, target: ResizeTarget) -> Self {
        Self {
            grid: GridSpec { height, width },
            target,
            config: SearchConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }
}

/// A reduced fraction in (0, 1], used as an exact resize factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fraction {
    pub numerator: u32,
    pub denominator: u32,
}

impl Fraction {
    pub fn quotient(self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

/// Every distinct value `n/d` with `1 <= n <= d <= max_denominator`, ordered by
/// denominator then numerator. Each value appears once, in lowest terms: a pair
/// sharing a factor has the same value as a pair with a smaller denominator that
/// was already produced.
pub fn generate_fractions(max_denominator: u32) -> Vec<Fraction> {
    (1..=max_denominator)
        .flat_map(|denominator| {
            (1..=denominator)
                .filter(move |&numerator| gcd(numerator, denominator) == 1)
                .map(move |numerator| Fraction {
                    numerator,
                    denominator,
                })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaddingPlan {
    pub denominator: u32,
    pub pad_x: u64,
    pub pad_y: u64,
    pub new_width: u64,
    pub new_height: u64,
    pub new_area: u64,
    /// `|pad_x - pad_y|`. Not consulted when picking a candidate.
    pub pad_diff: u64,
}

impl PaddingPlan {
    /// Fails with [`CoreError::GridTooLarge`] when the padded grid or its
    /// area does not fit in a `u64`.
    pub fn for_denominator(grid: &GridSpec, denominator: u32) -> Result<Self, CoreError> {
        let too_large = || CoreError::GridTooLarge {
            height: grid.height,
            width: grid.width,
        };
        let d = denominator as u64;
        let pad_x = (d - grid.width % d) % d;
        let pad_y = (d - grid.height % d) % d;
        let new_width = grid.width.checked_add(pad_x).ok_or_else(too_large)?;
        let new_height = grid.height.checked_add(pad_y).ok_or_else(too_large)?;
        let new_area = new_width.checked_mul(new_height).ok_or_else(too_large)?;
        Ok(Self {
            denominator,
            pad_x,
            pad_y,
            new_width,
            new_height,
            new_area,
            pad_diff: pad_x.abs_diff(pad_y),
        })
    }
}

/// Padding for every denominator in `1..=max_denominator`; entry `i` is for
/// denominator `i + 1`.
pub fn padding_table(grid: &GridSpec, max_denominator: u32) -> Result<Vec<PaddingPlan>, CoreError> {
    (1..=max_denominator)
        .map(|denominator| PaddingPlan::for_denominator(grid, denominator))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub numerator: u32,
    pub denominator: u32,
    pub pad_x: u64,
    pub pad_y: u64,
    pub new_area: u64,
    pub new_height: u64,
    pub new_width: u64,
    pub new_cell_size: f64,
    pub resized_height: u64,
    pub resized_width: u64,
    /// The winning fraction's quotient.
    pub scale: f64,
    pub cell_size_diff: f64,
}

impl Candidate {
    fn new(fraction: Fraction, padding: &PaddingPlan, cell_size: f64, target_cell_size: f64) -> Self {
        let quotient = fraction.quotient();
        let new_cell_size = cell_size / quotient;
        let numerator = fraction.numerator as u64;
        let denominator = fraction.denominator as u64;
        Self {
            numerator: fraction.numerator,
            denominator: fraction.denominator,
            pad_x: padding.pad_x,
            pad_y: padding.pad_y,
            new_area: padding.new_area,
            new_height: padding.new_height,
            new_width: padding.new_width,
            new_cell_size,
            // numerator <= denominator <= each padded dimension, so both products are
            // bounded by new_area; the padded dimensions divide exactly
            resized_height: padding.new_height * numerator / denominator,
            resized_width: padding.new_width * numerator / denominator,
            scale: quotient,
            cell_size_diff: (target_cell_size - new_cell_size).abs(),
        }
    }

    pub fn fraction(&self) -> Fraction {
        Fraction {
            numerator: self.numerator,
            denominator: self.denominator,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceEventType {
    Start,
    ScaleResolved,
    FractionsGenerated,
    TargetCellSize,
    Selected,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    pub event_type: TraceEventType,
    pub detail: Option<String>,
}

pub trait TraceSink: Send + Sync {
    fn emit(&self, event: TraceEvent);
}

#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    #[error("target height and width imply different scales ({scale_y} vs {scale_x}); cells would not stay square")]
    ConflictingTargets { scale_x: f64, scale_y: f64 },
    #[error("a target height, target width or scale must be specified")]
    MissingTarget,
    #[error("unable to determine how to pad and resize while preserving square cell size")]
    NoSolution,
    #[error("grid dimensions must be positive, got {height}x{width}")]
    InvalidGrid { height: u64, width: u64 },
    #[error("grid {height}x{width} is too large to pad and resize without overflow")]
    GridTooLarge { height: u64, width: u64 },
    #[error("scale must be a positive finite number, got {0}")]
    InvalidScale(f64),
    #[error("cell size must be a positive finite number, got {0}")]
    InvalidCellSize(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    ConflictingTargets,
    MissingTarget,
    NoSolution,
    InvalidInput,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl CoreError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ConflictingTargets { .. } => ErrorCode::ConflictingTargets,
            Self::MissingTarget => ErrorCode::MissingTarget,
            Self::NoSolution => ErrorCode::NoSolution,
            Self::InvalidGrid { .. }
            | Self::GridTooLarge { .. }
            | Self::InvalidScale(_)
            | Self::InvalidCellSize(_) => ErrorCode::InvalidInput,
        }
    }

    pub fn as_error_info(&self) -> ErrorInfo {
        ErrorInfo {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

/// Derives the single scale factor implied by `target`.
///
/// Target dimensions win over an explicit `scale`; when both dimensions are
/// given they must agree exactly.
pub fn resolve_scale(grid: &GridSpec, target: &ResizeTarget) -> Result<f64, CoreError> {
    let scale = match (target.target_height, target.target_width) {
        (Some(target_height), Some(target_width)) => {
            let scale_y = target_height / grid.height as f64;
            let scale_x = target_width / grid.width as f64;
            if scale_x != scale_y {
                return Err(CoreError::ConflictingTargets { scale_x, scale_y });
            }
            scale_y
        }
        (Some(target_height), None) => target_height / grid.height as f64,
        (None, Some(target_width)) => target_width / grid.width as f64,
        (None, None) => target.scale.ok_or(CoreError::MissingTarget)?,
    };
    if !scale.is_finite() || scale <= 0.0 {
        return Err(CoreError::InvalidScale(scale));
    }
    Ok(scale)
}

/// Every candidate for `scale`, stably sorted by ascending `cell_size_diff`.
/// Equal diffs keep generation order, so the smallest denominator comes first.
pub fn rank_candidates(
    grid: &GridSpec,
    scale: f64,
    config: &SearchConfig,
) -> Result<Vec<Candidate>, CoreError> {
    let target_cell_size = config.cell_size / scale;
    let table = padding_table(grid, config.max_denominator)?;
    let mut candidates = generate_fractions(config.max_denominator)
        .into_iter()
        .map(|fraction| {
            let padding = &table[fraction.denominator as usize - 1];
            Candidate::new(fraction, padding, config.cell_size, target_cell_size)
        })
        .collect::<Vec<_>>();
    candidates.sort_by(|a, b| a.cell_size_diff.total_cmp(&b.cell_size_diff));
    Ok(candidates)
}

pub fn resize(request: &ResizeRequest) -> Result<Candidate, CoreError> {
    resize_with_trace(request, None)
}

pub fn resize_with_trace(
    request: &ResizeRequest,
    trace: Option<&dyn TraceSink>,
) -> Result<Candidate, CoreError> {
    let sink = trace.filter(|_| request.config.debug);
    emit(sink, TraceEventType::Start, None);
    let result = select(request, sink);
    match &result {
        Ok(selection) => emit(
            sink,
            TraceEventType::Selected,
            Some(format!(
                "{}/{} pad={}x{} resized={}x{} diff={}",
                selection.numerator,
                selection.denominator,
                selection.pad_x,
                selection.pad_y,
                selection.resized_width,
                selection.resized_height,
                selection.cell_size_diff
            )),
        ),
        Err(err) => emit(sink, TraceEventType::Error, Some(err.to_string())),
    }
    result
}

fn select(request: &ResizeRequest, sink: Option<&dyn TraceSink>) -> Result<Candidate, CoreError> {
    let ResizeRequest { grid, target, config } = request;
    if grid.height == 0 || grid.width == 0 {
        return Err(CoreError::InvalidGrid {
            height: grid.height,
            width: grid.width,
        });
    }
    if !config.cell_size.is_finite() || config.cell_size <= 0.0 {
        return Err(CoreError::InvalidCellSize(config.cell_size));
    }

    let scale = resolve_scale(grid, target)?;
    emit(sink, TraceEventType::ScaleResolved, Some(scale.to_string()));

    let candidates = rank_candidates(grid, scale, config)?;
    emit(
        sink,
        TraceEventType::FractionsGenerated,
        Some(format!("considering {} fractions", candidates.len())),
    );
    emit(
        sink,
        TraceEventType::TargetCellSize,
        Some((config.cell_size / scale).to_string()),
    );

    candidates.into_iter().next().ok_or(CoreError::NoSolution)
}

fn emit(sink: Option<&dyn TraceSink>, event_type: TraceEventType, detail: Option<String>) {
    if let Some(sink) = sink {
        sink.emit(TraceEvent { event_type, detail });
    }
}

pub mod v1 {
    use super::*;

    /// Flat request shape for JSON callers. Absent fields take the defaults of
    /// [`SearchConfig`].
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ResizeRequest {
        pub height: u64,
        pub width: u64,
        pub cell_size: Option<f64>,
        pub target_height: Option<f64>,
        pub target_width: Option<f64>,
        pub scale: Option<f64>,
        #[serde(alias = "maxDenominator")]
        pub max_denominator: Option<u32>,
        pub debug: Option<bool>,
    }

    pub type ResizeResponse = Candidate;

    impl From<ResizeRequest> for super::ResizeRequest {
        fn from(request: ResizeRequest) -> Self {
            Self {
                grid: GridSpec {
                    height: request.height,
                    width: request.width,
                },
                target: ResizeTarget {
                    target_height: request.target_height,
                    target_width: request.target_width,
                    scale: request.scale,
                },
                config: resolve_search_config(SearchOverrides {
                    cell_size: request.cell_size,
                    max_denominator: request.max_denominator,
                    debug: request.debug,
                }),
            }
        }
    }

    pub fn resize(request: ResizeRequest) -> Result<ResizeResponse, ErrorInfo> {
        resize_with_trace(request, None)
    }

    /// Like [`resize`], sending trace events to `trace` when the request sets `debug`.
    pub fn resize_with_trace(
        request: ResizeRequest,
        trace: Option<&dyn TraceSink>,
    ) -> Result<ResizeResponse, ErrorInfo> {
        super::resize_with_trace(&request.into(), trace).map_err(|err| err.as_error_info())
    }
}
