//! Seeded patient-arrival generator.
//!
//! Planned patients of both groups arrive during working hours with uniform
//! `[0, 1)` hour gaps; ER patients arrive around the clock with exponential
//! gaps of mean one hour. Half of all patients come without an identifier.

use std::sync::Arc;

use chrono::NaiveDateTime;
use rand::{Rng, SeedableRng};
use rand_distr::Exp1;
use rand_pcg::Pcg64Mcg;
use uuid::Uuid;

use crate::core::{Arrival, DurationOracle};
use crate::util::clock::{hours_delta, is_working_hour, next_non_working_hour, next_working_hour};
use crate::util::serde::{CallbackRef, Diagnosis, DiagnosisGroup, PatientType};

/// Time-ordered arrival feed.
pub struct ArrivalGenerator {
    rng: Pcg64Mcg,
    oracle: Arc<dyn DurationOracle>,
    issued: u64,
}

impl ArrivalGenerator {
    /// Generator drawing diagnoses from `oracle`.
    pub fn new(seed: Option<u64>, oracle: Arc<dyn DurationOracle>) -> Self {
        let seed = seed.unwrap_or_else(rand::random);
        Self {
            rng: Pcg64Mcg::seed_from_u64(seed),
            oracle,
            issued: 0,
        }
    }

    /// Every arrival in `[start, end)`, sorted by arrival time.
    pub fn generate(&mut self, start: NaiveDateTime, end: NaiveDateTime) -> Vec<Arrival> {
        let mut arrivals = Vec::new();

        let mut t = start;
        while t < end {
            if is_working_hour(t) {
                let close = next_non_working_hour(t).min(end);
                for group in [DiagnosisGroup::A, DiagnosisGroup::B] {
                    self.planned(t, close, group, &mut arrivals);
                }
                t = close;
            } else {
                t = next_working_hour(t);
            }
        }

        let mut t = start;
        while t < end {
            let arrival = self.arrival(PatientType::Er, None, t);
            arrivals.push(arrival);
            let gap: f64 = self.rng.sample(Exp1);
            t += hours_delta(gap);
        }

        arrivals.sort_by_key(|a| a.arrival_time);
        tracing::debug!(count = arrivals.len(), %start, %end, "arrivals generated");
        arrivals
    }

    fn planned(
        &mut self,
        mut t: NaiveDateTime,
        end: NaiveDateTime,
        group: DiagnosisGroup,
        out: &mut Vec<Arrival>,
    ) {
        while t < end && is_working_hour(t) {
            let diagnosis = self.oracle.assign_diagnosis(Some(group));
            out.push(self.arrival(PatientType::Planned, Some(diagnosis), t));
            let gap = self.rng.random::<f64>();
            t += hours_delta(gap);
        }
    }

    fn arrival(
        &mut self,
        patient_type: PatientType,
        diagnosis: Option<Diagnosis>,
        at: NaiveDateTime,
    ) -> Arrival {
        self.issued += 1;
        let patient_id = self
            .rng
            .random_bool(0.5)
            .then(|| Uuid::from_u128(self.rng.random()).to_string());
        Arrival {
            patient_type,
            patient_id,
            diagnosis,
            arrival_time: at,
            callback: CallbackRef::new(format!("arrival-{:06}", self.issued)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StochasticOracle;
    use chrono::NaiveDate;

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2018, 1, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn generator(seed: u64) -> ArrivalGenerator {
        ArrivalGenerator::new(Some(seed), Arc::new(StochasticOracle::new(Some(seed))))
    }

    #[test]
    fn test_planned_patients_only_in_working_hours() {
        let arrivals = generator(1).generate(at(1, 0), at(8, 0));
        assert!(!arrivals.is_empty());
        for a in arrivals.iter().filter(|a| a.patient_type == PatientType::Planned) {
            assert!(is_working_hour(a.arrival_time), "{}", a.arrival_time);
            assert!(a.diagnosis.is_some());
        }
        assert!(arrivals
            .iter()
            .any(|a| a.patient_type == PatientType::Er && !is_working_hour(a.arrival_time)));
    }

    #[test]
    fn test_feed_is_sorted_and_bounded() {
        let arrivals = generator(2).generate(at(1, 6), at(2, 6));
        assert!(arrivals.windows(2).all(|w| w[0].arrival_time <= w[1].arrival_time));
        assert!(arrivals.iter().all(|a| a.arrival_time >= at(1, 6) && a.arrival_time < at(2, 6)));
        let anonymous = arrivals.iter().filter(|a| a.patient_id.is_none()).count();
        assert!(anonymous > 0 && anonymous < arrivals.len());
    }

    #[test]
    fn test_same_seed_same_feed() {
        let a = generator(3).generate(at(1, 0), at(2, 0));
        let b = generator(3).generate(at(1, 0), at(2, 0));
        assert_eq!(a, b);
    }
}
