use std::fs::File;
use std::io::{BufWriter, Write};
use std::time::Instant;

use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;

use compass_core::{
    Algorithm, DataSet, Error, KdTree, Result, SolverInput, SolverOptions, boruvka_tour,
    farthest_addition_tour, greedy_tour, logging, nearest_neighbor_tour, qboruvka_tour,
};

fn main() -> Result<()> {
    let now = Instant::now();
    let options = SolverOptions::from_args()?;
    logging::init_logger(
        options.log_level.to_filter(),
        options.log_format,
        options.log_timestamp,
        options.log_output_path(),
    )?;
    let input = SolverInput::read(&options)?;

    info!("input: points={}", input.len());
    info!("options: {options}");

    let (xs, ys) = input.into_coords();
    let mut data = DataSet::new(xs, ys);
    data.set_norm(options.norm.to_norm())?;

    if options.start >= data.len() {
        return Err(Error::invalid_input(format!(
            "start node {} out of range for {} points",
            options.start,
            data.len()
        )));
    }

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut tree = KdTree::build(&data, None, &mut rng)?;

    let tour = match options.algorithm {
        Algorithm::NearestNeighbor => {
            nearest_neighbor_tour(Some(&mut tree), &data, options.start, &mut rng)?
        }
        Algorithm::Greedy => greedy_tour(Some(&mut tree), &data, &mut rng)?,
        Algorithm::QBoruvka => qboruvka_tour(Some(&mut tree), &data, &mut rng)?,
        Algorithm::Boruvka => boruvka_tour(Some(&mut tree), &data, &mut rng)?,
        Algorithm::FarthestAddition => {
            farthest_addition_tour(Some(&mut tree), &data, options.start, &mut rng)?
        }
    };

    write_tour(&options, &data, &tour.cycle)?;

    info!(
        "output: n={} len={} time={:.2}s",
        tour.cycle.len(),
        tour.len,
        now.elapsed().as_secs_f32()
    );

    Ok(())
}

fn write_tour(options: &SolverOptions, data: &DataSet, cycle: &[usize]) -> Result<()> {
    let mut out: Box<dyn Write> = match options.output_path() {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(std::io::stdout().lock())),
    };
    let mut xbuf = ryu::Buffer::new();
    let mut ybuf = ryu::Buffer::new();
    for &n in cycle {
        writeln!(
            out,
            "{},{}",
            xbuf.format(data.x(n)),
            ybuf.format(data.y(n))
        )?;
    }
    out.flush()?;
    Ok(())
}
