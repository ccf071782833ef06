use crate::Differentiable;

/// Wraps an objective and records every point it is evaluated at.
pub struct MockObjective<G> {
    f: G,
    pub points: Vec<Vec<f64>>,
}

impl<G> MockObjective<G>
where
    G: FnMut(&[f64], &mut [f64]) -> f64,
{
    pub fn new(f: G) -> Self {
        Self { f, points: vec![] }
    }

    pub fn evaluations(&self) -> usize {
        self.points.len()
    }
}

impl<G> Differentiable<f64> for MockObjective<G>
where
    G: FnMut(&[f64], &mut [f64]) -> f64,
{
    fn evaluate(&mut self, x: &[f64], gradient: &mut [f64]) -> f64 {
        self.points.push(x.to_vec());
        (self.f)(x, gradient)
    }
}

pub fn sum_of_squares(x: &[f64], gradient: &mut [f64]) -> f64 {
    for (g, &xi) in gradient.iter_mut().zip(x) {
        *g = 2. * xi;
    }
    x.iter().map(|xi| xi * xi).sum()
}

/// `$\sum_i c_i (x_i - 1)^2$`
pub fn weighted_squares(c: Vec<f64>) -> impl FnMut(&[f64], &mut [f64]) -> f64 {
    move |x: &[f64], gradient: &mut [f64]| {
        let mut value = 0.;
        for i in 0..x.len() {
            gradient[i] = 2. * c[i] * (x[i] - 1.);
            value += c[i] * (x[i] - 1.) * (x[i] - 1.);
        }
        value
    }
}

pub fn rosenbrock(x: &[f64], gradient: &mut [f64]) -> f64 {
    let (a, b) = (x[0], x[1]);
    gradient[0] = -2. * (1. - a) - 400. * a * (b - a * a);
    gradient[1] = 200. * (b - a * a);
    (1. - a) * (1. - a) + 100. * (b - a * a) * (b - a * a)
}

/// `$\sum_i c_i x_i^4 + e^{x_i - 0.3}$`
pub fn quartic_exp(c: f64) -> impl FnMut(&[f64], &mut [f64]) -> f64 {
    move |x: &[f64], gradient: &mut [f64]| {
        let mut value = 0.;
        for (g, &xi) in gradient.iter_mut().zip(x) {
            let e = (xi - 0.3).exp();
            *g = 4. * c * xi * xi * xi + e;
            value += c * xi * xi * xi * xi + e;
        }
        value
    }
}
