use tracing_subscriber::EnvFilter;

use warpsim::control::MUL_CODE;
use warpsim::metrics;
use warpsim::workload::Matrix;
use warpsim::{Device, DeviceConfig};

/// CPU reference matmul used to verify the simulated device.
fn reference_matmul(a: &Matrix, b: &Matrix) -> Matrix {
    let (m, n, k) = (a.rows(), b.cols(), a.cols());
    let mut out = vec![0u32; m * n];
    for i in 0..m {
        for j in 0..n {
            for l in 0..k {
                out[i * n + j] = out[i * n + j].wrapping_add(a.get(i, l).wrapping_mul(b.get(l, j)));
            }
        }
    }
    Matrix::from_vec(m, n, out).expect("reference shape is consistent")
}

fn main() -> warpsim::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = DeviceConfig::default();
    let mut device = Device::new(config.clone())?;
    println!(
        "Initialized device: {} SMs x {} warps x {} lanes, {}-bit ALUs, {} memory cells",
        config.num_sms,
        config.warps_per_sm,
        config.lanes_per_warp,
        config.bit_width,
        config.global_memory_size,
    );

    let a = Matrix::from_rows(&[
        [13, 5, 7, 3],
        [12, 4, 9, 6],
        [8, 2, 14, 7],
        [11, 1, 10, 5],
    ]);
    let b = Matrix::from_rows(&[
        [1, 2, 3, 4],
        [5, 6, 7, 8],
        [9, 10, 11, 12],
        [13, 14, 15, 16],
    ]);

    // --- Matrix multiplication demo ---
    device.load(a.clone(), b.clone(), "matmul")?;
    device.partition()?;
    let stats = device.execute(MUL_CODE)?;

    let expected = reference_matmul(&a, &b);
    let mut all_correct = true;
    if let Some(result) = device.reconstruct()?.matrix() {
        println!("\nDevice matrix multiplication:");
        for i in 0..result.rows() {
            let row: Vec<u32> = (0..result.cols()).map(|j| result.get(i, j)).collect();
            println!("  {row:?}");
            for j in 0..result.cols() {
                if result.get(i, j) != expected.get(i, j) {
                    println!(
                        "MISMATCH at ({i},{j}): got {}, expected {}",
                        result.get(i, j),
                        expected.get(i, j),
                    );
                    all_correct = false;
                }
            }
        }
    }
    if all_correct {
        println!("Verification PASSED: matches CPU reference matmul");
    }
    println!(
        "Stats: {} pairs | {} padded | {} truncated | {} SMs | {} warps | {} lanes",
        stats.pairs_total,
        stats.pairs_padded,
        stats.pairs_truncated,
        stats.sms_engaged,
        stats.warps_run,
        stats.lanes_run,
    );
    metrics::write_snapshot(&stats, &std::env::temp_dir().join("warpsim_last_run.json"));

    // --- Dot product demo ---
    device.load(vec![1, 2, 3], vec![4, 5, 6], "dot")?;
    device.partition()?;
    device.execute(MUL_CODE)?;
    if let Some(value) = device.reconstruct()?.scalar() {
        println!("\nDevice dot product of [1,2,3] and [4,5,6]: {value} (expected 32)");
    }

    Ok(())
}
