use rand::Rng;

pub fn xavier_uniform<R: Rng + ?Sized>(size: usize, rng: &mut R) -> Vec<f32> {
    let limit = (6.0 / size as f32).sqrt();
    (0..size)
        .map(|_| rng.gen_range(-limit..limit))
        .collect()
}
