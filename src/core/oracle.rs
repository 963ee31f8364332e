//! Stochastic durations and diagnosis outcomes.
//!
//! All randomness flows through one seeded `Pcg64Mcg` stream so a run with a
//! fixed seed is reproducible.

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rand_pcg::Pcg64Mcg;

use crate::core::SimulationError;
use crate::util::serde::{Diagnosis, DiagnosisGroup};

/// Mean and standard deviation of the intake step, in hours.
pub const INTAKE_DURATION: (f64, f64) = (1.0, 0.125);
/// Mean and standard deviation of an ER treatment, in hours.
pub const ER_TREATMENT_DURATION: (f64, f64) = (2.0, 0.5);

/// Source of treatment durations and diagnosis-dependent outcomes.
pub trait DurationOracle: Send + Sync {
    /// Operation time for a surgical diagnosis.
    ///
    /// # Errors
    ///
    /// [`SimulationError::UnknownDiagnosis`] for diagnoses without an operation.
    fn operation_duration(&self, diagnosis: Diagnosis) -> Result<f64, SimulationError>;
    /// Time spent in a nursing bed.
    ///
    /// # Errors
    ///
    /// [`SimulationError::UnknownDiagnosis`] when the diagnosis has no nursing entry.
    fn nursing_duration(&self, diagnosis: Diagnosis) -> Result<f64, SimulationError>;
    /// Time spent in intake.
    fn intake_duration(&self) -> f64;
    /// Time spent in ER treatment.
    fn er_treatment_duration(&self) -> f64;
    /// Whether the diagnosis needs an operation.
    fn requires_surgery(&self, diagnosis: Diagnosis) -> bool;
    /// Whether nursing ends with a complication.
    fn has_complication(&self, diagnosis: Diagnosis) -> bool;
    /// Draw a diagnosis; `None` picks the group with equal chance, as for ER patients.
    fn assign_diagnosis(&self, group: Option<DiagnosisGroup>) -> Diagnosis;
    /// Whether an ER complaint turns out to have no cause.
    fn phantom_pain(&self) -> bool;
}

/// Diagnoses treated without an operation.
pub const fn is_surgical(diagnosis: Diagnosis) -> bool {
    !matches!(diagnosis, Diagnosis::A1 | Diagnosis::B1 | Diagnosis::B2)
}

const fn operation_params(diagnosis: Diagnosis) -> Option<(f64, f64)> {
    match diagnosis {
        Diagnosis::A2 => Some((1.0, 0.25)),
        Diagnosis::A3 => Some((2.0, 0.5)),
        Diagnosis::A4 | Diagnosis::B3 => Some((4.0, 0.5)),
        Diagnosis::B4 => Some((4.0, 1.0)),
        Diagnosis::A1 | Diagnosis::B1 | Diagnosis::B2 => None,
    }
}

const fn nursing_params(diagnosis: Diagnosis) -> (f64, f64) {
    match diagnosis {
        Diagnosis::A1 => (4.0, 0.5),
        Diagnosis::A2 | Diagnosis::B1 => (8.0, 2.0),
        Diagnosis::A3 | Diagnosis::A4 | Diagnosis::B2 => (16.0, 2.0),
        Diagnosis::B3 | Diagnosis::B4 => (16.0, 4.0),
    }
}

const fn complication_probability(diagnosis: Diagnosis) -> f64 {
    match diagnosis {
        Diagnosis::A1 | Diagnosis::A2 | Diagnosis::B2 => 0.01,
        Diagnosis::A3 | Diagnosis::A4 | Diagnosis::B3 | Diagnosis::B4 => 0.02,
        Diagnosis::B1 => 0.001,
    }
}

/// Relative frequency of each code within its group.
const DIAGNOSIS_WEIGHTS: [f64; 4] = [0.5, 0.25, 0.125, 0.125];

/// Reference oracle: clipped normal durations and weighted diagnosis draws.
pub struct StochasticOracle {
    rng: Mutex<Pcg64Mcg>,
}

impl StochasticOracle {
    /// Seeded oracle; `None` draws a seed from the thread RNG.
    pub fn new(seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(rand::random);
        tracing::debug!(seed, "duration oracle seeded");
        Self {
            rng: Mutex::new(Pcg64Mcg::seed_from_u64(seed)),
        }
    }

    fn clipped_normal(&self, (mean, std_dev): (f64, f64)) -> f64 {
        let mut rng = self.rng.lock();
        Normal::new(mean, std_dev)
            .map_or(mean, |normal| normal.sample(&mut *rng))
            .max(0.0)
    }

    fn uniform(&self) -> f64 {
        self.rng.lock().random::<f64>()
    }
}

impl DurationOracle for StochasticOracle {
    fn operation_duration(&self, diagnosis: Diagnosis) -> Result<f64, SimulationError> {
        operation_params(diagnosis)
            .map(|params| self.clipped_normal(params))
            .ok_or_else(|| {
                SimulationError::UnknownDiagnosis(format!("{diagnosis} has no operation"))
            })
    }

    fn nursing_duration(&self, diagnosis: Diagnosis) -> Result<f64, SimulationError> {
        Ok(self.clipped_normal(nursing_params(diagnosis)))
    }

    fn intake_duration(&self) -> f64 {
        self.clipped_normal(INTAKE_DURATION)
    }

    fn er_treatment_duration(&self) -> f64 {
        self.clipped_normal(ER_TREATMENT_DURATION)
    }

    fn requires_surgery(&self, diagnosis: Diagnosis) -> bool {
        is_surgical(diagnosis)
    }

    fn has_complication(&self, diagnosis: Diagnosis) -> bool {
        self.uniform() < complication_probability(diagnosis)
    }

    fn assign_diagnosis(&self, group: Option<DiagnosisGroup>) -> Diagnosis {
        let group = group.unwrap_or_else(|| {
            if self.uniform() < 0.5 {
                DiagnosisGroup::A
            } else {
                DiagnosisGroup::B
            }
        });
        let codes = match group {
            DiagnosisGroup::A => Diagnosis::GROUP_A,
            DiagnosisGroup::B => Diagnosis::GROUP_B,
        };
        let mut roll = self.uniform();
        for (code, weight) in codes.iter().zip(DIAGNOSIS_WEIGHTS) {
            if roll < weight {
                return *code;
            }
            roll -= weight;
        }
        codes[codes.len() - 1]
    }

    fn phantom_pain(&self) -> bool {
        self.uniform() < 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_surgical_diagnoses_have_no_operation() {
        let oracle = StochasticOracle::new(Some(7));
        for d in [Diagnosis::A1, Diagnosis::B1, Diagnosis::B2] {
            assert!(!oracle.requires_surgery(d));
            assert!(oracle.operation_duration(d).is_err());
        }
        for d in [Diagnosis::A2, Diagnosis::A3, Diagnosis::A4, Diagnosis::B3, Diagnosis::B4] {
            assert!(oracle.requires_surgery(d));
            assert!(oracle.operation_duration(d).unwrap() >= 0.0);
        }
    }

    #[test]
    fn test_durations_are_non_negative() {
        let oracle = StochasticOracle::new(Some(11));
        for _ in 0..1_000 {
            assert!(oracle.intake_duration() >= 0.0);
            assert!(oracle.er_treatment_duration() >= 0.0);
            assert!(oracle.nursing_duration(Diagnosis::B4).unwrap() >= 0.0);
        }
    }

    #[test]
    fn test_same_seed_same_stream() {
        let a = StochasticOracle::new(Some(42));
        let b = StochasticOracle::new(Some(42));
        for _ in 0..20 {
            assert!((a.intake_duration() - b.intake_duration()).abs() < f64::EPSILON);
            assert_eq!(a.assign_diagnosis(None), b.assign_diagnosis(None));
        }
    }

    #[test]
    fn test_assignment_respects_group() {
        let oracle = StochasticOracle::new(Some(3));
        for _ in 0..200 {
            assert_eq!(oracle.assign_diagnosis(Some(DiagnosisGroup::A)).group(), DiagnosisGroup::A);
            assert_eq!(oracle.assign_diagnosis(Some(DiagnosisGroup::B)).group(), DiagnosisGroup::B);
        }
    }

    #[test]
    fn test_intake_mean_is_about_one_hour() {
        let oracle = StochasticOracle::new(Some(5));
        let n = 5_000;
        let mean = (0..n).map(|_| oracle.intake_duration()).sum::<f64>() / f64::from(n);
        assert!((mean - 1.0).abs() < 0.02, "mean was {mean}");
    }
}
