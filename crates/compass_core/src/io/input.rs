use std::{fmt, fs, io::Read};

use crate::io::options::SolverOptions;
use crate::{Error, Result};

/// One input point in the plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// The parsed point set for one run.
#[derive(Clone, Debug)]
pub struct SolverInput {
    pub points: Vec<Point>,
}

impl SolverInput {
    /// Reads points from the configured input file, or stdin when none is
    /// set.
    pub fn read(options: &SolverOptions) -> Result<Self> {
        let raw = match options.input_path() {
            Some(path) => fs::read_to_string(path).map_err(|e| {
                Error::invalid_input(format!("failed to read {}: {e}", path.display()))
            })?,
            None => {
                let mut buffer = String::new();
                std::io::stdin().read_to_string(&mut buffer)?;
                buffer
            }
        };
        Ok(Self {
            points: parse_points(&raw)?,
        })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn into_coords(self) -> (Vec<f64>, Vec<f64>) {
        let mut xs = Vec::with_capacity(self.points.len());
        let mut ys = Vec::with_capacity(self.points.len());
        for p in self.points {
            xs.push(p.x);
            ys.push(p.y);
        }
        (xs, ys)
    }
}

fn parse_points(input: &str) -> Result<Vec<Point>> {
    let mut points = Vec::new();
    for (idx, tok) in input.split_whitespace().enumerate() {
        let mut it = tok.split(',');
        let x_s = it
            .next()
            .ok_or_else(|| Error::invalid_input(format!("Token {}: missing x", idx + 1)))?;
        let y_s = it
            .next()
            .ok_or_else(|| Error::invalid_input(format!("Token {}: missing y", idx + 1)))?;

        if it.next().is_some() {
            return Err(Error::invalid_input(format!(
                "Token {}: expected 'x,y' but got extra comma fields: {tok}",
                idx + 1
            )));
        }

        let x: f64 = x_s.parse().map_err(|_| {
            Error::invalid_input(format!("Token {}: invalid x coordinate: {x_s}", idx + 1))
        })?;
        let y: f64 = y_s.parse().map_err(|_| {
            Error::invalid_input(format!("Token {}: invalid y coordinate: {y_s}", idx + 1))
        })?;

        points.push(Point::new(x, y));
    }

    if points.is_empty() {
        return Err(Error::invalid_input("No points provided."));
    }

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::parse_points;

    #[test]
    fn parse_points_reads_whitespace_separated_pairs() {
        let points = parse_points("1.0,2.0\n3.0,4.0 5.0,6.0").expect("parse points");
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].to_string(), "1,2");
        assert_eq!(points[2].x, 5.0);
        assert_eq!(points[2].y, 6.0);
    }

    #[test]
    fn parse_points_rejects_empty_input() {
        let err = parse_points(" \n\t ").expect_err("empty input should fail");
        assert!(err.to_string().contains("No points provided."));
    }

    #[test]
    fn parse_points_rejects_extra_comma_fields() {
        let err = parse_points("1,2,3").expect_err("extra fields should fail");
        assert!(err.to_string().contains("expected 'x,y'"));
    }

    #[test]
    fn parse_points_rejects_non_numeric_coordinates() {
        let err = parse_points("a,2").expect_err("invalid x should fail");
        assert!(err.to_string().contains("invalid x coordinate"));
    }
}
