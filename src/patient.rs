use crate::error::{DdiError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper age bound accepted by the intake form
pub const MAX_AGE: u32 = 120;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientProfile {
    age: u32,
    drug1: String,
    drug2: String,
    lab_results: String,
}

impl PatientProfile {
    pub fn new(
        age: u32,
        drug1: impl Into<String>,
        drug2: impl Into<String>,
        lab_results: impl Into<String>,
    ) -> Result<Self> {
        if age > MAX_AGE {
            return Err(DdiError::InvalidRequest(format!(
                "Patient age {} exceeds {}",
                age, MAX_AGE
            )));
        }
        Ok(Self {
            age,
            drug1: drug1.into(),
            drug2: drug2.into(),
            lab_results: lab_results.into(),
        })
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn drug1(&self) -> &str {
        &self.drug1
    }

    pub fn drug2(&self) -> &str {
        &self.drug2
    }

    pub fn lab_results(&self) -> &str {
        &self.lab_results
    }
}

impl fmt::Display for PatientProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "- Age: {}\n- Medications: {} and {}\n- Lab Results: {}",
            self.age, self.drug1, self.drug2, self.lab_results
        )
    }
}
