//! Fisher–Jenks natural breaks.
//!
//! Values are sorted and partitioned into `k` contiguous classes minimising
//! the total within-class sum of squared deviations. The dynamic program is
//! `cost[j][i] = min_m cost[j-1][m] + ssd(m, i)` over the first `i` sorted
//! values. The optimal split point is monotone in `i`, so each layer is
//! filled by divide and conquer in O(n log n), giving O(k·n log n) overall.
//! Segment costs come from prefix sums of the median-shifted values.

use crate::compute::aggregate::AggregateRow;
use crate::error::ClassifierError;
use serde::{Deserialize, Serialize};

/// Ordered class boundaries.
///
/// `breaks` holds the `k - 1` inner boundaries. Class `i` covers
/// `[breaks[i - 1], breaks[i])`, with the first class open below and the
/// last class open above; `min` and `max` record the classified range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassBreaks {
    min: f64,
    max: f64,
    breaks: Vec<f64>,
}

impl ClassBreaks {
    /// Number of classes.
    pub fn k(&self) -> usize {
        self.breaks.len() + 1
    }

    pub fn breaks(&self) -> &[f64] {
        &self.breaks
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Class index of `value`, by binary search over the boundaries.
    ///
    /// # Examples
    ///
    /// ```
    /// use choropleth::compute::classify::classify;
    ///
    /// let values = [1.0, 2.0, 3.0, 10.0, 11.0, 12.0].map(Some);
    /// let breaks = classify(&values, 2).unwrap();
    /// assert_eq!(breaks.breaks(), &[10.0]);
    /// assert_eq!(breaks.class_of(3.0), 0);
    /// assert_eq!(breaks.class_of(10.0), 1);
    /// ```
    pub fn class_of(&self, value: f64) -> usize {
        self.breaks.partition_point(|b| *b <= value)
    }

    /// Like [`class_of`](Self::class_of), but `None` for NaN and infinities,
    /// which lie outside every class.
    pub fn class_of_value(&self, value: f64) -> Option<usize> {
        value.is_finite().then(|| self.class_of(value))
    }

    /// `(lower, upper)` bounds of class `class`; the first class starts at
    /// `min` and the last ends at `max`.
    pub fn class_range(&self, class: usize) -> Option<(f64, f64)> {
        if class >= self.k() {
            return None;
        }
        let lower = if class == 0 { self.min } else { self.breaks[class - 1] };
        let upper = if class + 1 == self.k() {
            self.max
        } else {
            self.breaks[class]
        };
        Some((lower, upper))
    }

    /// Goodness of variance fit: `1 - SDCM / SDAM`, in `[0, 1]`.
    ///
    /// No-data entries are ignored. Returns 1.0 when the values have no
    /// variance at all.
    pub fn goodness_of_fit(&self, values: &[Option<f64>]) -> f64 {
        let data: Vec<f64> = values.iter().flatten().copied().filter(|v| v.is_finite()).collect();
        let sdam = squared_deviation(data.iter().copied());
        if sdam <= 0.0 {
            return 1.0;
        }
        let mut per_class: Vec<Vec<f64>> = vec![Vec::new(); self.k()];
        for v in &data {
            per_class[self.class_of(*v)].push(*v);
        }
        let sdcm: f64 = per_class
            .into_iter()
            .map(|c| squared_deviation(c.into_iter()))
            .sum();
        (1.0 - sdcm / sdam).clamp(0.0, 1.0)
    }
}

fn squared_deviation(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let (count, sum) = values.clone().fold((0usize, 0.0), |(c, s), v| (c + 1, s + v));
    if count == 0 {
        return 0.0;
    }
    let mean = sum / count as f64;
    values.map(|v| (v - mean) * (v - mean)).sum()
}

/// Largest class count a [`Classifier`] accepts unless told otherwise.
///
/// The back-pointer table holds `(k - 1) * (n + 1)` entries, so `k` is
/// bounded up front along with the input size.
pub const DEFAULT_MAX_CLASSES: usize = 64;

/// Classifier with class-count and input-size guards.
#[derive(Debug, Clone)]
pub struct Classifier {
    classes: usize,
    max_classes: usize,
    max_values: usize,
}

impl Classifier {
    pub fn new(classes: usize) -> Self {
        Self {
            classes,
            max_classes: DEFAULT_MAX_CLASSES,
            max_values: usize::MAX,
        }
    }

    /// Refuse class counts above `limit`.
    pub fn with_max_classes(mut self, limit: usize) -> Self {
        self.max_classes = limit;
        self
    }

    /// Refuse inputs with more than `limit` data values.
    pub fn with_max_values(mut self, limit: usize) -> Self {
        self.max_values = limit;
        self
    }

    pub fn classes(&self) -> usize {
        self.classes
    }

    /// Compute natural breaks, checking both limits before any table is
    /// allocated.
    pub fn classify(&self, values: &[Option<f64>]) -> Result<ClassBreaks, ClassifierError> {
        if self.classes == 0 {
            return Err(ClassifierError::InvalidClassCount(self.classes));
        }
        if self.classes > self.max_classes {
            return Err(ClassifierError::TooManyClasses {
                classes: self.classes,
                limit: self.max_classes,
            });
        }
        let n = values.iter().flatten().filter(|v| v.is_finite()).count();
        if n > self.max_values {
            return Err(ClassifierError::TooManyValues {
                values: n,
                limit: self.max_values,
            });
        }
        natural_breaks(values, self.classes)
    }

    pub fn classify_rows(&self, rows: &[AggregateRow]) -> Result<ClassBreaks, ClassifierError> {
        let values: Vec<Option<f64>> = rows.iter().map(|r| r.value).collect();
        self.classify(&values)
    }
}

/// Compute optimal natural breaks for `k` classes.
///
/// `None` entries are the "no data" sentinel and are skipped, as are
/// non-finite values. Equal values may end up on both sides of a boundary.
///
/// # Errors
///
/// - [`ClassifierError::InvalidClassCount`] if `k == 0`.
/// - [`ClassifierError::TooManyClasses`] if `k` exceeds
///   [`DEFAULT_MAX_CLASSES`].
/// - [`ClassifierError::NoData`] if there are no data values.
/// - [`ClassifierError::InsufficientData`] if `k` exceeds the number of
///   data values.
pub fn classify(values: &[Option<f64>], k: usize) -> Result<ClassBreaks, ClassifierError> {
    Classifier::new(k).classify(values)
}

fn natural_breaks(values: &[Option<f64>], k: usize) -> Result<ClassBreaks, ClassifierError> {
    let mut sorted: Vec<f64> = values.iter().flatten().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return Err(ClassifierError::NoData);
    }
    if k > sorted.len() {
        return Err(ClassifierError::InsufficientData {
            classes: k,
            values: sorted.len(),
        });
    }
    sorted.sort_by(f64::total_cmp);

    let starts = fisher_jenks(&sorted, k);
    let breaks: Vec<f64> = starts.iter().map(|&i| sorted[i]).collect();
    log::debug!(
        "natural breaks for {} values in {} classes: {:?}",
        sorted.len(),
        k,
        breaks
    );

    Ok(ClassBreaks {
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        breaks,
    })
}

/// Class index for every row; `None` for no-data and non-finite rows.
pub fn classify_rows(rows: &[AggregateRow], breaks: &ClassBreaks) -> Vec<Option<usize>> {
    rows.iter()
        .map(|r| r.value.and_then(|v| breaks.class_of_value(v)))
        .collect()
}

/// Prefix sums for O(1) segment cost.
struct SegmentCost {
    s1: Vec<f64>,
    s2: Vec<f64>,
}

impl SegmentCost {
    fn new(sorted: &[f64]) -> Self {
        let shift = sorted[sorted.len() / 2];
        let mut s1 = Vec::with_capacity(sorted.len() + 1);
        let mut s2 = Vec::with_capacity(sorted.len() + 1);
        s1.push(0.0);
        s2.push(0.0);
        for v in sorted {
            let d = v - shift;
            s1.push(s1[s1.len() - 1] + d);
            s2.push(s2[s2.len() - 1] + d * d);
        }
        Self { s1, s2 }
    }

    /// Sum of squared deviations of `sorted[a..b]`.
    #[inline]
    fn ssd(&self, a: usize, b: usize) -> f64 {
        let count = (b - a) as f64;
        let sum = self.s1[b] - self.s1[a];
        (self.s2[b] - self.s2[a] - sum * sum / count).max(0.0)
    }
}

struct Layer<'a> {
    cost: &'a SegmentCost,
    classes: usize,
    prev: &'a [f64],
    cur: Vec<f64>,
    arg: Vec<usize>,
}

impl Layer<'_> {
    /// Fill `cur[lo..=hi]` knowing the optimal split lies in `opt_lo..=opt_hi`.
    fn fill(&mut self, lo: usize, hi: usize, opt_lo: usize, opt_hi: usize) {
        if lo > hi {
            return;
        }
        let mid = lo + (hi - lo) / 2;
        let from = opt_lo.max(self.classes - 1);
        let to = opt_hi.min(mid - 1);

        let mut best = f64::INFINITY;
        let mut best_m = from;
        for m in from..=to {
            let c = self.prev[m] + self.cost.ssd(m, mid);
            if c < best {
                best = c;
                best_m = m;
            }
        }
        self.cur[mid] = best;
        self.arg[mid] = best_m;

        if mid > lo {
            self.fill(lo, mid - 1, opt_lo, best_m);
        }
        self.fill(mid + 1, hi, best_m, opt_hi);
    }
}

/// Start index (into `sorted`) of classes `1..k`.
fn fisher_jenks(sorted: &[f64], k: usize) -> Vec<usize> {
    let n = sorted.len();
    if k <= 1 {
        return Vec::new();
    }
    let cost = SegmentCost::new(sorted);

    // One class over the first i values.
    let mut prev: Vec<f64> = (0..=n)
        .map(|i| if i == 0 { 0.0 } else { cost.ssd(0, i) })
        .collect();
    let mut back: Vec<Vec<usize>> = Vec::with_capacity(k - 1);

    for classes in 2..=k {
        let mut layer = Layer {
            cost: &cost,
            classes,
            prev: &prev,
            cur: vec![f64::INFINITY; n + 1],
            arg: vec![0; n + 1],
        };
        layer.fill(classes, n, classes - 1, n - 1);
        let Layer { cur, arg, .. } = layer;
        back.push(arg);
        prev = cur;
    }

    let mut starts = vec![0; k - 1];
    let mut end = n;
    for classes in (2..=k).rev() {
        let m = back[classes - 2][end];
        starts[classes - 2] = m;
        end = m;
    }
    starts
}
