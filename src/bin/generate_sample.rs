use std::fs::File;
use std::io::Write;

use anyhow::{Context, Result};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

fn generate_spectrum(
    wavenumbers: &[f64],
    peaks: &[(f64, f64, f64)],
    noise_level: f64,
    rng: &mut SimpleRng,
) -> Vec<f64> {
    wavenumbers
        .iter()
        .map(|&wn| {
            let signal: f64 = peaks
                .iter()
                .map(|&(mu, sigma, amp)| gaussian(wn, mu, sigma, amp))
                .sum();
            signal + rng.gauss(0.0, noise_level)
        })
        .collect()
}

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
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
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

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

const SAMPLES: [(&str, &[(f64, f64, f64)]); 3] = [
    ("sample_a", &[(520.0, 6.0, 0.8), (640.0, 10.0, 0.5)]),
    ("sample_b", &[(560.0, 8.0, 0.6), (700.0, 12.0, 0.7)]),
    ("sample_c", &[(480.0, 5.0, 0.9), (610.0, 9.0, 0.4)]),
];

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);

    // Shared axis: 400 → 798, step 2
    let axis: Vec<f64> = (0..200).map(|i| 400.0 + i as f64 * 2.0).collect();
    let concentrations = [0.5, 1.0, 2.0];

    let mut keys = Vec::new();
    let mut rows = Vec::new();
    let mut meta: Vec<(String, &str, f64, bool)> = Vec::new();
    for &(sample, peaks) in &SAMPLES {
        for (rep, &conc) in concentrations.iter().enumerate() {
            let scaled: Vec<(f64, f64, f64)> = peaks
                .iter()
                .map(|&(mu, sigma, amp)| (mu, sigma, amp * conc))
                .collect();
            let key = format!("{sample}_{rep}");
            rows.push(generate_spectrum(&axis, &scaled, 0.005 * conc, &mut rng));
            meta.push((key.clone(), sample, conc, rep == 0));
            keys.push(key);
        }
    }

    // Matrix CSV: one line per axis point, one column per spectrum
    let vector_path = "sample_vector.csv";
    let mut writer = csv::Writer::from_path(vector_path)
        .with_context(|| format!("creating {vector_path}"))?;
    let mut header = vec!["wavelength".to_string()];
    header.extend(keys.iter().cloned());
    writer.write_record(&header)?;
    for (i, x) in axis.iter().enumerate() {
        let mut record = vec![x.to_string()];
        record.extend(rows.iter().map(|row| format!("{:.6}", row[i])));
        writer.write_record(&record)?;
    }
    writer.flush()?;

    // Metadata listed in reverse so the importer has to realign it
    let meta_path = "sample_metadata.csv";
    let mut writer =
        csv::Writer::from_path(meta_path).with_context(|| format!("creating {meta_path}"))?;
    writer.write_record(["pkey", "sample", "concentration", "reference"])?;
    for (key, sample, conc, reference) in meta.iter().rev() {
        let conc = conc.to_string();
        writer.write_record([
            key.as_str(),
            *sample,
            conc.as_str(),
            if *reference { "true" } else { "false" },
        ])?;
    }
    writer.flush()?;

    // Trajectory archive: each sample on its own, slightly shifted axis
    let zip_path = "sample_trajectories.zip";
    let file = File::create(zip_path).with_context(|| format!("creating {zip_path}"))?;
    let mut archive = ZipWriter::new(file);
    for (n, (key, row)) in keys.iter().zip(&rows).enumerate() {
        let offset = n as f64 * 0.5;
        archive.start_file(format!("spectra/{key}"), SimpleFileOptions::default())?;
        for (x, y) in axis.iter().zip(row) {
            writeln!(archive, "{},{y:.6}", x + offset)?;
        }
    }
    archive.finish()?;

    println!(
        "Wrote {} spectra ({} points each) to {vector_path}, {meta_path} and {zip_path}",
        keys.len(),
        axis.len()
    );
    Ok(())
}
