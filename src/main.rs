use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info, warn};

use trifem::{
    analysis::{cantilever, plate_reference_deflection, run_plate},
    config::load_plate_model,
    datatypes::{BeamSection, Vertex},
    derived::{relative_error_percent, triangle_area, triangle_centroid, triangle_quality},
    post_processor,
    solver::IterationObserver,
    Result,
};

/// Structural FEM verification runs
#[derive(Parser, Debug)]
#[command(name = "trifem", version, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Cantilever with a tip load, refined over 1 to 16 beam elements
    Beam {
        #[arg(long, default_value_t = 3.0)]
        length: f64,
        #[arg(long, default_value_t = 210e9)]
        youngs: f64,
        #[arg(long, default_value_t = 0.01)]
        area: f64,
        #[arg(long, default_value_t = 8.333e-6)]
        inertia: f64,
        #[arg(long, default_value_t = 10_000.0)]
        load: f64,
    },
    /// Triangle area, quality and centroid against known values
    Triangle,
    /// Mesh, assemble and solve a plate described by a json input file
    Plate {
        /// Path to the input json
        input: String,
        #[arg(long, default_value = "nodes.csv")]
        nodes_csv: String,
        #[arg(long, default_value = "elements.csv")]
        elements_csv: String,
        /// Watch the iterative solver; overrides the input file
        #[arg(long, value_enum)]
        observer: Option<Observer>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Observer {
    Silent,
    Progress,
    Terminal,
}

impl From<Observer> for IterationObserver {
    fn from(observer: Observer) -> Self {
        match observer {
            Observer::Silent => IterationObserver::Silent,
            Observer::Progress => IterationObserver::ProgressBar,
            Observer::Terminal => IterationObserver::Terminal,
        }
    }
}

fn beam(section: BeamSection, length: f64, load: f64) -> Result<()> {
    info!(
        "cantilever L={length}, E={}, A={}, I={}, P={load}",
        section.youngs_modulus, section.area, section.moment_of_inertia
    );

    println!("{:>8} {:>16} {:>10} {:>16} {:>10}", "elements", "tip w", "error %", "tip rz", "error %");
    for num_elements in [1, 2, 4, 8, 16] {
        let result = cantilever(&section, length, load, num_elements)?;
        println!(
            "{:>8} {:>16.6e} {:>10.6} {:>16.6e} {:>10.6}",
            num_elements,
            result.deflection,
            relative_error_percent(result.deflection, result.analytic_deflection),
            result.rotation,
            relative_error_percent(result.rotation, result.analytic_rotation),
        );
    }

    Ok(())
}

fn triangle() -> Result<()> {
    let v = |x: f64, y: f64| Vertex { x, y };
    let h = f64::sqrt(3.0) / 2.0;
    let cases = [
        ("right 3-4-5", [v(0.0, 0.0), v(3.0, 0.0), v(0.0, 4.0)], 6.0),
        ("equilateral", [v(0.0, 0.0), v(1.0, 0.0), v(0.5, h)], f64::sqrt(3.0) / 4.0),
        ("clockwise", [v(0.0, 0.0), v(0.0, 2.0), v(2.0, 0.0)], 2.0),
        ("colinear", [v(0.0, 0.0), v(1.0, 1.0), v(2.0, 2.0)], 0.0),
    ];

    println!("{:>12} {:>12} {:>12} {:>10} {:>22}", "case", "area", "expected", "quality", "centroid");
    for (name, [p1, p2, p3], expected) in cases {
        let area = triangle_area(p1, p2, p3);
        let centroid = triangle_centroid(p1, p2, p3);
        println!(
            "{:>12} {:>12.6} {:>12.6} {:>10.6} {:>10.6},{:>10.6}",
            name,
            area,
            expected,
            triangle_quality(p1, p2, p3),
            centroid.x,
            centroid.y
        );
        if (area - expected).abs() > 1e-12 {
            warn!("{name}: area {area} differs from {expected}");
        }
    }

    Ok(())
}

fn plate(input: &str, nodes_csv: &str, elements_csv: &str, observer: Option<Observer>) -> Result<()> {
    let mut model = load_plate_model(input)?;
    if let Some(observer) = observer {
        model.solver.observer = observer.into();
    }

    let solution = run_plate(&model)?;
    let (node, w_max) = solution.max_deflection();
    let vertex = solution.mesh.nodes[node];
    info!("max deflection {w_max:.6e} at node {node} ({}, {})", vertex.x, vertex.y);
    info!(
        "total vertical support reaction {:.6e}",
        solution.total_vertical_reaction()
    );

    let reference = plate_reference_deflection(&model)?;
    info!(
        "clamped square plate estimate {reference:.6e} ({:.2}% difference)",
        relative_error_percent(w_max, reference)
    );

    post_processor::csv_output(&solution, nodes_csv, elements_csv)
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if cli.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    let result = match cli.command {
        Command::Beam {
            length,
            youngs,
            area,
            inertia,
            load,
        } => beam(
            BeamSection {
                youngs_modulus: youngs,
                area,
                moment_of_inertia: inertia,
            },
            length,
            load,
        ),
        Command::Triangle => triangle(),
        Command::Plate {
            input,
            nodes_csv,
            elements_csv,
            observer,
        } => plate(&input, &nodes_csv, &elements_csv, observer),
    };

    if let Err(err) = result {
        error!("{err}");
        std::process::exit(1);
    }
}
