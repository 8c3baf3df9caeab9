//! Surround-view camera tool
//!
//! Runs the per-camera stages of the bird's-eye pipeline on image files and
//! maintains the calibration documents.
//!
//! # Usage
//! ```bash
//! # Undistort a raw fisheye frame
//! cargo run --release --bin surround_view -- undistort -c front.yaml -p front raw.png out.png
//!
//! # Full bird's-eye patch (undistort, project, flip)
//! cargo run --release --bin surround_view -- birdview -c left.yaml -p left raw.png patch.png
//!
//! # Fit the projection matrix from four picked pattern corners and save it
//! cargo run --release --bin surround_view -- projection -c front.yaml -p front \
//!     --corners 412,301 868,296 350,455 930,452
//!
//! # Adjust the undistortion scale/shift and save it
//! cargo run --release --bin surround_view -- recalibrate -c back.yaml -p back \
//!     --scale 0.7,0.8 --shift -150,-100
//! ```

use clap::{Args, Parser, Subcommand};
use nalgebra::Vector2;
use std::error::Error;
use std::path::PathBuf;
use std::time::Instant;
use surround_view::{homography, init_logger, project_keypoints, CameraModel, MountingPosition};
use tracing::info;

/// Fisheye undistortion and bird's-eye projection for surround-view cameras
#[derive(Parser)]
#[command(name = "surround_view")]
#[command(about = "Fisheye undistortion and bird's-eye projection for surround-view cameras")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct CameraArgs {
    /// Calibration YAML file
    #[arg(short, long, value_name = "FILE")]
    calib: PathBuf,

    /// Mounting position (front, back, left, right)
    #[arg(short, long)]
    position: MountingPosition,
}

#[derive(Subcommand)]
enum Command {
    /// Remap a raw fisheye frame into the undistorted image
    Undistort {
        #[command(flatten)]
        camera: CameraArgs,
        input: PathBuf,
        output: PathBuf,
    },

    /// Produce the oriented bird's-eye patch of a raw frame
    Birdview {
        #[command(flatten)]
        camera: CameraArgs,
        input: PathBuf,
        output: PathBuf,
    },

    /// Fit the projection matrix from pattern corners in an undistorted frame
    Projection {
        #[command(flatten)]
        camera: CameraArgs,

        /// Four corners as x,y in keypoint order (tl, tr, bl, br)
        #[arg(long, num_args = 4, value_parser = parse_pair, allow_hyphen_values = true)]
        corners: Vec<Vector2<f64>>,
    },

    /// Replace the undistortion scale/shift and save the calibration
    Recalibrate {
        #[command(flatten)]
        camera: CameraArgs,

        /// Focal length scale as sx,sy
        #[arg(long, value_parser = parse_pair, allow_hyphen_values = true)]
        scale: Vector2<f64>,

        /// Principal point shift as dx,dy
        #[arg(long, value_parser = parse_pair, allow_hyphen_values = true)]
        shift: Vector2<f64>,

        /// Optional raw frame to undistort with the new values
        #[arg(long, requires = "preview")]
        input: Option<PathBuf>,

        /// Where to write the preview
        #[arg(long, requires = "input")]
        preview: Option<PathBuf>,
    },
}

fn parse_pair(s: &str) -> Result<Vector2<f64>, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected 'x,y', got '{s}'"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid number '{v}': {e}"))
    };
    Ok(Vector2::new(parse(x)?, parse(y)?))
}

fn load_camera(args: &CameraArgs) -> Result<CameraModel, Box<dyn Error>> {
    Ok(CameraModel::load(&args.calib, args.position)?)
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    init_logger();

    match cli.command {
        Command::Undistort {
            camera,
            input,
            output,
        } => {
            let model = load_camera(&camera)?;
            let frame = image::open(&input)?.to_rgb8();
            let start = Instant::now();
            let result = model.undistort(&frame);
            info!(elapsed_ms = start.elapsed().as_millis() as u64, "undistorted frame");
            result.save(&output)?;
            info!(output = %output.display(), "wrote undistorted image");
        }
        Command::Birdview {
            camera,
            input,
            output,
        } => {
            let model = load_camera(&camera)?;
            let frame = image::open(&input)?.to_rgb8();
            let start = Instant::now();
            let result = model.birdview(&frame);
            info!(elapsed_ms = start.elapsed().as_millis() as u64, "projected frame");
            result.save(&output)?;
            info!(output = %output.display(), "wrote bird's-eye patch");
        }
        Command::Projection { camera, corners } => {
            let model = load_camera(&camera)?;
            let keypoints = project_keypoints(camera.position);
            let h = homography::from_correspondences(&corners, &keypoints)?;
            info!("projection matrix:\n{h}");
            model.replace_projection_matrix(h)?;
            model.save()?;
        }
        Command::Recalibrate {
            camera,
            scale,
            shift,
            input,
            preview,
        } => {
            let model = load_camera(&camera)?;
            model.recalibrate(scale, shift)?;
            model.save()?;
            if let (Some(input), Some(preview)) = (input, preview) {
                let frame = image::open(&input)?.to_rgb8();
                model.undistort(&frame).save(&preview)?;
                info!(output = %preview.display(), "wrote preview");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn recalibrate_args(extra: &[&str]) -> Vec<String> {
        let mut args: Vec<String> = [
            "surround_view",
            "recalibrate",
            "-c",
            "back.yaml",
            "-p",
            "back",
            "--scale",
            "0.7,0.8",
            "--shift",
            "-150,-100",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.extend(extra.iter().map(|s| s.to_string()));
        args
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_recalibrate_preview_needs_input() {
        assert!(Cli::try_parse_from(recalibrate_args(&["--preview", "out.png"])).is_err());
        assert!(Cli::try_parse_from(recalibrate_args(&["--input", "raw.png"])).is_err());
        assert!(Cli::try_parse_from(recalibrate_args(&[
            "--input", "raw.png", "--preview", "out.png"
        ]))
        .is_ok());
        assert!(Cli::try_parse_from(recalibrate_args(&[])).is_ok());
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(parse_pair("-150, 2.5"), Ok(Vector2::new(-150.0, 2.5)));
        assert!(parse_pair("1.0").is_err());
        assert!(parse_pair("a,1").is_err());
    }
}
