use std::path::PathBuf;

use rusty_fits::fits::fixture::{Col, FitsBuilder, ImageSpec, TableSpec};

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Row-major image of Gaussian blobs plus noise.
fn generate_image(
    shape: &[usize],
    blobs: &[(f64, f64, f64)],
    noise_level: f64,
    rng: &mut SimpleRng,
) -> Vec<f64> {
    let width = *shape.last().unwrap_or(&1) as f64;
    let count: usize = shape.iter().product();
    (0..count)
        .map(|i| {
            let x = (i % width as usize) as f64;
            let signal: f64 = blobs
                .iter()
                .map(|&(mu, sigma, amp)| gaussian(x, mu, sigma, amp))
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

fn main() {
    env_logger::init();
    let out_dir = PathBuf::from(std::env::args().nth(1).unwrap_or_else(|| ".".into()));
    std::fs::create_dir_all(&out_dir).expect("Failed to create output directory");

    let mut rng = SimpleRng::new(42);

    // Mixed container: empty primary, a 20-row catalogue and three images.
    let ids: Vec<i32> = (0..20).collect();
    let flux: Vec<f64> = (0..20)
        .map(|i| gaussian(i as f64, 10.0, 3.0, 5.0) + rng.gauss(0.0, 0.05))
        .collect();
    let names: Vec<String> = (0..20).map(|i| format!("src{i:02}")).collect();
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let flags: Vec<bool> = flux.iter().map(|f| *f > 1.0).collect();

    let generic = FitsBuilder::new()
        .empty_primary()
        .table(
            TableSpec::new("ATAB")
                .column(Col::int("id", ids))
                .column(Col::double("flux", flux).unit("Jy"))
                .column(Col::text("name", 8, &name_refs))
                .column(Col::logical("bright", flags)),
        )
        .image(
            ImageSpec::new(vec![4, 5], generate_image(&[4, 5], &[(2.0, 1.0, 3.0)], 0.1, &mut rng))
                .named("TWOD"),
        )
        .image(
            ImageSpec::new(vec![20], generate_image(&[20], &[(8.0, 2.0, 1.0)], 0.05, &mut rng))
                .named("ONED"),
        )
        .image(
            ImageSpec::new(
                vec![2, 2, 5],
                generate_image(&[2, 2, 5], &[(1.0, 1.5, 2.0)], 0.1, &mut rng),
            )
            .named("THREED"),
        );
    let path = out_dir.join("sample_generic.fits");
    generic.write(&path).expect("Failed to write sample_generic.fits");
    println!("Wrote {}", path.display());

    // Two same-shape images and one odd one out, gzip-wrapped.
    let merge = FitsBuilder::new()
        .image(ImageSpec::new(vec![3, 4], generate_image(&[3, 4], &[], 1.0, &mut rng)).named("A"))
        .image(ImageSpec::new(vec![3, 4], generate_image(&[3, 4], &[], 1.0, &mut rng)).named("B"))
        .image(ImageSpec::new(vec![20], generate_image(&[20], &[], 1.0, &mut rng)).named("C"));
    let path = out_dir.join("sample_merge.fits.gz");
    merge.write_gz(&path).expect("Failed to write sample_merge.fits.gz");
    println!("Wrote {}", path.display());

    // Four Stokes planes over a 2-channel, 8x8 sky.
    let shape = [4, 2, 8, 8];
    let cube = FitsBuilder::new().primary(
        ImageSpec::new(shape.to_vec(), generate_image(&shape, &[(4.0, 1.5, 10.0)], 0.2, &mut rng))
            .bitpix(-32)
            .card("CTYPE1", "RA---SIN")
            .card("CTYPE2", "DEC--SIN")
            .card("CTYPE3", "FREQ")
            .card("CTYPE4", "STOKES")
            .card("BUNIT", "Jy/beam"),
    );
    let path = out_dir.join("sample_cube.fits");
    cube.write(&path).expect("Failed to write sample_cube.fits");
    println!("Wrote {}", path.display());
}
