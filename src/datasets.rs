//! Generates the two moons binary classification dataset and utilities for plotting it and
//! a model's decision boundary
//!
//! Targets are -1 or 1. By convention class -1 is plotted in red and class 1 in blue.

use crate::{nn::Module, values::Value};
use std::{f64::consts::PI, ops::Range};

use plotters::{
    chart::ChartBuilder,
    prelude::{BitMapBackend, Circle, IntoDrawingArea, Rectangle},
    style::{BLUE, Color, RED, RGBColor, WHITE},
};
use rand::{Rng, seq::SliceRandom};
use rand_distr::{Distribution, Normal};
use thiserror::Error;

/// Errors for the dataset generators
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Noise must be a finite, non-negative standard deviation, got {noise}")]
    InvalidNoise { noise: f64 },
}

/// Generates two interleaving half circles, `n_samples / 2` points on the upper moon
/// (target -1) and the rest on the lower moon (target 1), shuffled, with gaussian noise of
/// standard deviation `noise` added to every coordinate
pub fn make_moons<R: Rng>(
    n_samples: usize,
    noise: f64,
    rng: &mut R,
) -> Result<(Vec<Vec<f64>>, Vec<f64>), DatasetError> {
    let n_outer = n_samples / 2;
    let n_inner = n_samples - n_outer;
    if !noise.is_finite() || noise < 0.0 {
        return Err(DatasetError::InvalidNoise { noise });
    }
    let normal = if noise > 0.0 {
        Some(Normal::new(0.0, noise).map_err(|_| DatasetError::InvalidNoise { noise })?)
    } else {
        None
    };

    let mut samples = Vec::with_capacity(n_samples);
    for t in linspace(0.0, PI, n_outer) {
        samples.push((vec![t.cos(), t.sin()], -1.0));
    }
    for t in linspace(0.0, PI, n_inner) {
        samples.push((vec![1.0 - t.cos(), 1.0 - t.sin() - 0.5], 1.0));
    }
    samples.shuffle(rng);

    let (data, targets) = samples
        .into_iter()
        .map(|(point, target)| {
            let noisy = point
                .into_iter()
                .map(|x| match &normal {
                    Some(normal) => x + normal.sample(rng),
                    None => x,
                })
                .collect::<Vec<_>>();
            (noisy, target)
        })
        .unzip();
    Ok((data, targets))
}

/// `n` evenly spaced points over `[start, end]`, both ends included
fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => vec![],
        1 => vec![start],
        _ => (0..n)
            .map(|i| start + (end - start) * i as f64 / (n - 1) as f64)
            .collect(),
    }
}

/// Bounds of the data padded by `margin` on every side
fn plot_bounds(data: &[Vec<f64>], margin: f64) -> (Range<f64>, Range<f64>) {
    let fold = |axis: usize| {
        data.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p[axis]), hi.max(p[axis]))
        })
    };
    let (x_min, x_max) = fold(0);
    let (y_min, y_max) = fold(1);
    if data.is_empty() {
        return (-margin..margin, -margin..margin);
    }
    (
        x_min - margin..x_max + margin,
        y_min - margin..y_max + margin,
    )
}

/// Plots the data points and targets
pub fn plot_data(
    data: &[Vec<f64>],
    targets: &[f64],
    file_name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let root_area = BitMapBackend::new(file_name, (640, 480)).into_drawing_area();
    root_area.fill(&WHITE)?;

    let (x_range, y_range) = plot_bounds(data, 0.5);
    let mut chart = ChartBuilder::on(&root_area)
        .caption("Dataset: moons", ("sans-serif", 40))
        .margin(20)
        .x_label_area_size(30)
        .y_label_area_size(30)
        .build_cartesian_2d(x_range, y_range)?;

    chart.configure_mesh().draw()?;

    chart.draw_series(data.iter().zip(targets.iter()).map(|(point, &target)| {
        let color = if target > 0.0 { BLUE } else { RED };
        Circle::new((point[0], point[1]), 3, color.filled())
    }))?;

    root_area.present()?;
    log::info!("Data plot has been saved to '{}'.", file_name);

    Ok(())
}

/// Plots the decision boundary for a given model by sampling a grid of points and evaluating
/// the sign of the model's first output
pub fn plot_decision_boundary(
    model: &dyn Module,
    file_name: &str,
    data: &[Vec<f64>],
    targets: &[f64],
) -> Result<(), Box<dyn std::error::Error>> {
    let root_area = BitMapBackend::new(file_name, (640, 480)).into_drawing_area();
    root_area.fill(&WHITE)?;

    let (x_range, y_range) = plot_bounds(data, 1.0);
    let mut chart = ChartBuilder::on(&root_area)
        .caption("Decision Boundary", ("sans-serif", 40))
        .margin(20)
        .x_label_area_size(30)
        .y_label_area_size(30)
        .build_cartesian_2d(x_range.clone(), y_range.clone())?;

    chart.configure_mesh().draw()?;

    let red_bg = RGBColor(255, 200, 200);
    let blue_bg = RGBColor(200, 200, 255);

    let step = 0.1;
    let n_x = ((x_range.end - x_range.start) / step).ceil() as usize;
    let n_y = ((y_range.end - y_range.start) / step).ceil() as usize;
    let grid_points = (0..n_x).flat_map(|xi| {
        let x = x_range.start + xi as f64 * step;
        (0..n_y).map(move |yi| (x, y_range.start + yi as f64 * step))
    });

    // evaluate up front so model errors propagate instead of panicking mid draw
    let cells = grid_points
        .map(|(x, y)| -> Result<_, Box<dyn std::error::Error>> {
            let output = model.forward(&[Value::new(x), Value::new(y)])?;
            let positive = output.first().is_some_and(|v| v.data() > 0.0);
            Ok((x, y, positive))
        })
        .collect::<Result<Vec<_>, Box<dyn std::error::Error>>>()?;

    chart.draw_series(cells.into_iter().map(|(x, y, positive)| {
        let color = if positive { blue_bg } else { red_bg };
        Rectangle::new(
            [
                (x - step / 2.0, y - step / 2.0),
                (x + step / 2.0, y + step / 2.0),
            ],
            color.filled(),
        )
    }))?;

    // plot the data points
    chart.draw_series(data.iter().zip(targets.iter()).map(|(point, &target)| {
        let color = if target > 0.0 { BLUE } else { RED };
        Circle::new((point[0], point[1]), 3, color.filled())
    }))?;

    root_area.present()?;
    log::info!("Decision boundary plot saved to '{}'.", file_name);
    Ok(())
}
