use std::f64::consts::TAU;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Recording length in seconds and sampling interval.
const DURATION: f64 = 240.0;
const DT: f64 = 0.05;

/// (classification, breaths per minute, tidal volume in L)
const COHORTS: [(&str, f64, f64); 4] = [
    ("Normal", 14.0, 0.55),
    ("Asthmatic", 20.0, 0.40),
    ("Smoker", 17.0, 0.45),
    ("Vaper", 16.0, 0.50),
];
const SUBJECTS_PER_COHORT: u32 = 3;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos();
        mean + std_dev * z
    }
}

struct Subject {
    number: u32,
    classification: String,
    rate: f64,
    tidal: f64,
}

fn write_subject_info(path: &Path, subjects: &[Subject], rng: &mut SimpleRng) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record([
        "Subject Number",
        "Trial Classification",
        "Sex (M/F)",
        "Age [years]",
        "Height [cm]",
        "Weight [kg]",
        "Asthma (Y/N)",
        "History of Smoking (Y/N)",
        "History of Vaping (Y/N)",
    ])?;

    for s in subjects {
        let female = s.number % 2 == 0;
        let flag = |set: bool| if set { "Y" } else { "N" };
        writer.write_record([
            s.number.to_string(),
            format!("{} {}", s.classification, if female { "Female" } else { "Male" }),
            (if female { "F" } else { "M" }).to_string(),
            format!("{:.0}", rng.uniform(19.0, 64.0)),
            format!("{:.0}", rng.gauss(if female { 165.0 } else { 178.0 }, 6.0)),
            format!("{:.0}", rng.gauss(if female { 62.0 } else { 78.0 }, 8.0)),
            flag(s.classification == "Asthmatic").to_string(),
            flag(s.classification == "Smoker").to_string(),
            flag(s.classification == "Vaper").to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_series(path: &Path, subject: &Subject, rng: &mut SimpleRng) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record([
        "Time [s]",
        "Flow [L/s]",
        "V_tidal [L]",
        "Pressure [cmH2O]",
        "Time (Aeration Data)_[s]",
        "Chest [mm]",
        "Abd [mm]",
    ])?;

    let omega = TAU * subject.rate / 60.0;
    let chest_base = rng.uniform(850.0, 950.0);
    let abdomen_base = rng.uniform(750.0, 850.0);
    let rows = (DURATION / DT) as usize;

    for i in 0..=rows {
        let t = i as f64 * DT;
        let phase = omega * t;
        let volume = subject.tidal / 2.0 * (1.0 - phase.cos()) + rng.gauss(0.0, 0.004);
        let flow = subject.tidal / 2.0 * omega * phase.sin() + rng.gauss(0.0, 0.01);
        let pressure = 1.5 * phase.sin() + rng.gauss(0.0, 0.05);
        let chest = chest_base + 4.0 * (1.0 - phase.cos()) + rng.gauss(0.0, 0.2);
        let abdomen = abdomen_base + 6.0 * (1.0 - (phase - 0.4).cos()) + rng.gauss(0.0, 0.2);

        writer.write_record([
            format!("{t:.3}"),
            format!("{flow:.5}"),
            format!("{:.5}", volume.max(0.0)),
            format!("{pressure:.4}"),
            format!("{t:.3}"),
            format!("{chest:.3}"),
            format!("{abdomen:.3}"),
        ])?;
    }
    writer.flush()?;
    Ok(rows + 1)
}

fn main() -> Result<()> {
    let root = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sample_dataset"));
    let series_dir = root.join("Processed_Dataset");
    fs::create_dir_all(&series_dir).with_context(|| format!("creating {}", series_dir.display()))?;

    let mut rng = SimpleRng::new(42);
    let mut subjects = Vec::new();
    let mut number = 1;
    for (classification, rate, tidal) in COHORTS {
        for _ in 0..SUBJECTS_PER_COHORT {
            subjects.push(Subject {
                number,
                classification: classification.to_string(),
                rate: rate + rng.gauss(0.0, 1.0),
                tidal: tidal * rng.uniform(0.9, 1.1),
            });
            number += 1;
        }
    }

    write_subject_info(&root.join("subject-info.csv"), &subjects, &mut rng)?;
    let mut total = 0;
    for subject in &subjects {
        let path = series_dir.join(format!("ProcessedData_Subject{:02}.csv", subject.number));
        total += write_series(&path, subject, &mut rng)?;
    }

    println!(
        "Wrote {} subjects ({total} samples) to {}",
        subjects.len(),
        root.display()
    );
    Ok(())
}
