//! # SIMD-Accelerated Distance Functions
//!
//! Cosine similarity and dot product over `f32` buffers.
//!
//! ## Supported Operations
//! - Cosine similarity (zero-norm inputs score 0, never NaN)
//! - Dot product
//! - In-place L2 normalization
//!
//! ## Implementation Strategy
//! 1. Detect CPU features once per process (`Capabilities`)
//! 2. Capture the chosen kernel in an immutable `VectorMath`
//! 3. Dispatch to AVX2+FMA / NEON, or the portable scalar kernel
//!
//! The scalar kernel accumulates in `f64` and is identical on every
//! platform. Vectorized kernels accumulate in `f32` lanes and agree with it
//! to within `1e-4` on cosine similarity. When an `f32` lane sum overflows,
//! or a squared norm comes out too small to trust, the call is redone on
//! the scalar kernel. Norms and normalization always use the scalar
//! kernel.

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

#[cfg(target_arch = "aarch64")]
use std::arch::aarch64::*;

use std::sync::OnceLock;

use vsearch_core::error::{ensure_dimension, Result};

/// Squared-norm tolerance for treating a vector as unit length
pub const UNIT_TOLERANCE: f64 = 1e-4;

static CAPABILITIES: OnceLock<Capabilities> = OnceLock::new();
static GLOBAL: OnceLock<VectorMath> = OnceLock::new();

/// CPU features relevant to the distance kernels.
///
/// Fields are private: a descriptor claiming features the CPU lacks would
/// let safe code reach an unsupported instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    avx2: bool,
    fma: bool,
    neon: bool,
}

impl Capabilities {
    /// Probe the running CPU
    pub fn detect() -> Self {
        #[cfg(target_arch = "x86_64")]
        {
            Self {
                avx2: is_x86_feature_detected!("avx2"),
                fma: is_x86_feature_detected!("fma"),
                neon: false,
            }
        }

        #[cfg(target_arch = "aarch64")]
        {
            Self {
                avx2: false,
                fma: false,
                neon: std::arch::is_aarch64_feature_detected!("neon"),
            }
        }

        #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
        {
            Self::portable()
        }
    }

    /// No hardware acceleration
    pub const fn portable() -> Self {
        Self {
            avx2: false,
            fma: false,
            neon: false,
        }
    }

    pub fn avx2(&self) -> bool {
        self.avx2
    }

    pub fn fma(&self) -> bool {
        self.fma
    }

    pub fn neon(&self) -> bool {
        self.neon
    }

    pub fn has_vector_unit(&self) -> bool {
        (self.avx2 && self.fma) || self.neon
    }
}

/// Process-wide capabilities, detected on first use
pub fn capabilities() -> &'static Capabilities {
    CAPABILITIES.get_or_init(Capabilities::detect)
}

/// Kernel family chosen from a `Capabilities` descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kernel {
    Avx2Fma,
    Neon,
    Scalar,
}

impl Kernel {
    pub fn select(caps: &Capabilities) -> Self {
        if caps.avx2 && caps.fma {
            Kernel::Avx2Fma
        } else if caps.neon {
            Kernel::Neon
        } else {
            Kernel::Scalar
        }
    }
}

/// Distance kernels bound to one immutable capability descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorMath {
    kernel: Kernel,
}

impl VectorMath {
    pub fn new(caps: &Capabilities) -> Self {
        Self {
            kernel: Kernel::select(caps),
        }
    }

    /// Portable double-precision kernels
    pub const fn scalar() -> Self {
        Self {
            kernel: Kernel::Scalar,
        }
    }

    /// Shared instance built from the process-wide capabilities
    pub fn global() -> &'static VectorMath {
        GLOBAL.get_or_init(|| VectorMath::new(capabilities()))
    }

    pub fn kernel(&self) -> Kernel {
        self.kernel
    }

    /// Cosine similarity: dot(a,b) / (||a|| * ||b||), 0 if either norm is 0
    pub fn similarity(&self, a: &[f32], b: &[f32]) -> Result<f64> {
        ensure_dimension(a.len(), b.len())?;
        Ok(self.similarity_unchecked(a, b))
    }

    /// Dot product
    pub fn dot_product(&self, a: &[f32], b: &[f32]) -> Result<f64> {
        ensure_dimension(a.len(), b.len())?;
        Ok(self.dot(a, b))
    }

    /// Dot product of equal-length slices
    #[inline]
    pub(crate) fn dot(&self, a: &[f32], b: &[f32]) -> f64 {
        debug_assert_eq!(a.len(), b.len());

        let dot = match self.kernel {
            #[cfg(target_arch = "x86_64")]
            Kernel::Avx2Fma => unsafe { dot_product_avx2_fma(a, b) as f64 },
            #[cfg(target_arch = "aarch64")]
            Kernel::Neon => unsafe { dot_product_neon(a, b) as f64 },
            _ => return dot_product_scalar(a, b),
        };

        // f32 lanes overflowed
        if dot.is_finite() {
            dot
        } else {
            dot_product_scalar(a, b)
        }
    }

    /// `(dot, ||a||², ||b||²)` of equal-length slices in one pass
    #[inline]
    pub(crate) fn cosine_parts(&self, a: &[f32], b: &[f32]) -> (f64, f64, f64) {
        debug_assert_eq!(a.len(), b.len());

        let parts = match self.kernel {
            #[cfg(target_arch = "x86_64")]
            Kernel::Avx2Fma => unsafe { cosine_parts_avx2_fma(a, b) },
            #[cfg(target_arch = "aarch64")]
            Kernel::Neon => unsafe { cosine_parts_neon(a, b) },
            _ => return cosine_parts_scalar(a, b),
        };

        if lane_sums_exact(parts) {
            parts
        } else {
            cosine_parts_scalar(a, b)
        }
    }

    #[inline]
    pub(crate) fn similarity_unchecked(&self, a: &[f32], b: &[f32]) -> f64 {
        let (dot, norm_a, norm_b) = self.cosine_parts(a, b);
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot / (norm_a.sqrt() * norm_b.sqrt())
    }

    /// Euclidean norm, always accumulated in `f64`
    #[inline]
    pub fn norm(&self, v: &[f32]) -> f64 {
        dot_product_scalar(v, v).sqrt()
    }

    /// Normalize vector in-place. A zero or non-finite vector is left
    /// unchanged and `false` is returned.
    ///
    /// Accumulates in `f64`: the squared norm of finite `f32` input can
    /// overflow or underflow in `f32`.
    #[inline]
    pub fn normalize(&self, v: &mut [f32]) -> bool {
        let n = self.norm(v);
        if n > 0.0 && n.is_finite() {
            for x in v.iter_mut() {
                *x = (*x as f64 / n) as f32;
            }
            true
        } else {
            false
        }
    }

    /// Squared norm within `UNIT_TOLERANCE` of 1
    #[inline]
    pub fn is_unit(&self, v: &[f32]) -> bool {
        (dot_product_scalar(v, v) - 1.0).abs() <= UNIT_TOLERANCE
    }
}

impl Default for VectorMath {
    fn default() -> Self {
        *Self::global()
    }
}

/// Cosine similarity using the process-wide kernels
#[inline]
pub fn similarity(a: &[f32], b: &[f32]) -> Result<f64> {
    VectorMath::global().similarity(a, b)
}

/// Dot product using the process-wide kernels
#[inline]
pub fn dot_product(a: &[f32], b: &[f32]) -> Result<f64> {
    VectorMath::global().dot_product(a, b)
}

/// Compute vector norm (magnitude)
#[inline]
pub fn norm(v: &[f32]) -> f64 {
    VectorMath::global().norm(v)
}

/// Normalize vector in-place; returns `false` for a zero vector
#[inline]
pub fn normalize(v: &mut [f32]) -> bool {
    VectorMath::global().normalize(v)
}

/// Normalize vector, returning new vec
#[inline]
pub fn normalized(v: &[f32]) -> Vec<f32> {
    let mut result = v.to_vec();
    normalize(&mut result);
    result
}

/// Squared norm within `UNIT_TOLERANCE` of 1
#[inline]
pub fn is_unit(v: &[f32]) -> bool {
    VectorMath::global().is_unit(v)
}

// ============================================================================
// Scalar implementations (fallback, double precision)
// ============================================================================

#[inline]
fn dot_product_scalar(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| x as f64 * y as f64)
        .sum()
}

/// Smallest squared norm trusted from `f32` lanes. Below this, subnormal
/// rounding in the per-lane sums is no longer negligible.
const MIN_LANE_NORM_SQ: f64 = f32::MIN_POSITIVE as f64 * 16_777_216.0;

/// Vector-kernel sums are usable only if nothing overflowed and neither
/// squared norm fell into the subnormal range
#[inline]
fn lane_sums_exact((dot, norm_a, norm_b): (f64, f64, f64)) -> bool {
    dot.is_finite()
        && norm_a.is_finite()
        && norm_b.is_finite()
        && norm_a >= MIN_LANE_NORM_SQ
        && norm_b >= MIN_LANE_NORM_SQ
}

#[inline]
fn cosine_parts_scalar(a: &[f32], b: &[f32]) -> (f64, f64, f64) {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    (dot, norm_a, norm_b)
}

// ============================================================================
// AVX2 + FMA implementations (256-bit, 8 floats at a time)
// ============================================================================

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2", enable = "fma")]
unsafe fn dot_product_avx2_fma(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len();
    let chunks = n / 8;
    let remainder = n % 8;

    let mut sum = _mm256_setzero_ps();

    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    for i in 0..chunks {
        let offset = i * 8;
        let va = _mm256_loadu_ps(a_ptr.add(offset));
        let vb = _mm256_loadu_ps(b_ptr.add(offset));
        sum = _mm256_fmadd_ps(va, vb, sum);
    }

    let mut result = hsum256_ps(sum);

    let base = chunks * 8;
    for i in 0..remainder {
        result += a[base + i] * b[base + i];
    }

    result
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2", enable = "fma")]
unsafe fn cosine_parts_avx2_fma(a: &[f32], b: &[f32]) -> (f64, f64, f64) {
    let n = a.len();
    let chunks = n / 8;
    let remainder = n % 8;

    let mut dot_sum = _mm256_setzero_ps();
    let mut norm_a_sum = _mm256_setzero_ps();
    let mut norm_b_sum = _mm256_setzero_ps();

    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    for i in 0..chunks {
        let offset = i * 8;
        let va = _mm256_loadu_ps(a_ptr.add(offset));
        let vb = _mm256_loadu_ps(b_ptr.add(offset));

        dot_sum = _mm256_fmadd_ps(va, vb, dot_sum);
        norm_a_sum = _mm256_fmadd_ps(va, va, norm_a_sum);
        norm_b_sum = _mm256_fmadd_ps(vb, vb, norm_b_sum);
    }

    let mut dot = hsum256_ps(dot_sum);
    let mut norm_a = hsum256_ps(norm_a_sum);
    let mut norm_b = hsum256_ps(norm_b_sum);

    let base = chunks * 8;
    for i in 0..remainder {
        let x = a[base + i];
        let y = b[base + i];
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    (dot as f64, norm_a as f64, norm_b as f64)
}

// ============================================================================
// Helper functions for horizontal sums
// ============================================================================

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx")]
#[inline]
unsafe fn hsum256_ps(v: __m256) -> f32 {
    // Sum the high and low 128-bit lanes
    let high = _mm256_extractf128_ps(v, 1);
    let low = _mm256_castps256_ps128(v);
    let sum128 = _mm_add_ps(high, low);
    hsum128_ps(sum128)
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse3")]
#[inline]
unsafe fn hsum128_ps(v: __m128) -> f32 {
    let shuf = _mm_movehdup_ps(v);        // [1,1,3,3]
    let sums = _mm_add_ps(v, shuf);       // [0+1,1+1,2+3,3+3]
    let shuf = _mm_movehl_ps(sums, sums); // [2+3,3+3,2+3,3+3]
    let sums = _mm_add_ss(sums, shuf);    // [0+1+2+3,...]
    _mm_cvtss_f32(sums)
}

// ============================================================================
// ARM NEON implementations (128-bit, 4 floats at a time)
// ============================================================================

#[cfg(target_arch = "aarch64")]
#[inline]
unsafe fn dot_product_neon(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len();
    let chunks = n / 4;
    let remainder = n % 4;

    let mut sum = vdupq_n_f32(0.0);

    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    for i in 0..chunks {
        let offset = i * 4;
        let va = vld1q_f32(a_ptr.add(offset));
        let vb = vld1q_f32(b_ptr.add(offset));
        sum = vfmaq_f32(sum, va, vb);
    }

    let mut result = vaddvq_f32(sum);

    let base = chunks * 4;
    for i in 0..remainder {
        result += a[base + i] * b[base + i];
    }

    result
}

#[cfg(target_arch = "aarch64")]
#[inline]
unsafe fn cosine_parts_neon(a: &[f32], b: &[f32]) -> (f64, f64, f64) {
    let n = a.len();
    let chunks = n / 4;
    let remainder = n % 4;

    let mut dot_sum = vdupq_n_f32(0.0);
    let mut norm_a_sum = vdupq_n_f32(0.0);
    let mut norm_b_sum = vdupq_n_f32(0.0);

    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    for i in 0..chunks {
        let offset = i * 4;
        let va = vld1q_f32(a_ptr.add(offset));
        let vb = vld1q_f32(b_ptr.add(offset));

        dot_sum = vfmaq_f32(dot_sum, va, vb);
        norm_a_sum = vfmaq_f32(norm_a_sum, va, va);
        norm_b_sum = vfmaq_f32(norm_b_sum, vb, vb);
    }

    let mut dot = vaddvq_f32(dot_sum);
    let mut norm_a = vaddvq_f32(norm_a_sum);
    let mut norm_b = vaddvq_f32(norm_b_sum);

    let base = chunks * 4;
    for i in 0..remainder {
        let x = a[base + i];
        let y = b[base + i];
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    (dot as f64, norm_a as f64, norm_b as f64)
}
