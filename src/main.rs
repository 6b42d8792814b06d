use clap::{Parser, Subcommand};
use std::path::PathBuf;
use yass::output;
use yass::site::{DEFAULT_TARGET, PublishOptions, Site, SitePaths};

#[derive(Parser)]
#[command(name = "yass")]
#[command(about = "Static site generator with object-store publishing")]
#[command(long_about = "\
Static site generator with object-store publishing

Pages are HTML, Markdown or Jade files rendered through Tera layouts; data
files feed templates and generator pages.

Site structure:

  mysite/
  ├── yass.toml                    # Site config
  ├── static/                      # Copied to build/static/
  ├── pages/                       # One output page per source file
  │   ├── index.html               # → build/index.html
  │   ├── about.md                 # → build/about/index.html
  │   ├── blog/post1.md            # slug: hello-world → build/blog/hello-world/index.html
  │   └── _partials/               # Top-level `_` directories are not built
  ├── templates/
  │   └── layouts/default.html     # Default layout, fills {% block body %}
  ├── data/                        # posts.json → data.posts
  └── build/                       # Output, recreated on every build

Publishing uploads build/ to the bucket named after `sitename`, as configured
in [hosting.<target>].")]
#[command(version)]
struct Cli {
    /// Site root directory
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the site into build/
    Build,
    /// Build, then upload to the hosting target
    Publish {
        /// Hosting target, a [hosting.<target>] table in yass.toml
        #[arg(long, default_value = DEFAULT_TARGET)]
        target: String,
        /// Site name, overriding `sitename` from yass.toml
        #[arg(long)]
        sitename: Option<String>,
        /// Keep previously uploaded files
        #[arg(long)]
        no_purge: bool,
    },
    /// Create the hosted zone and alias records for the site
    SetupDns {
        #[arg(long, default_value = DEFAULT_TARGET)]
        target: String,
        #[arg(long)]
        sitename: Option<String>,
    },
    /// Delete and recreate build/
    Clean,
    /// Print the version
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let mut failure = None;

    match cli.command {
        Command::Build => {
            println!("==> Building {}", cli.root.display());
            let mut site = Site::open(&cli.root, None)?;
            let report = site.build()?;
            output::print_build_output(&report);
            println!("==> Build complete: {}", site.paths().build_dir.display());
        }
        Command::Publish {
            target,
            sitename,
            no_purge,
        } => {
            println!("==> Publishing {} to {}", cli.root.display(), target);
            let mut site = Site::open(&cli.root, None)?;
            let build = site.build()?;
            output::print_build_output(&build);
            println!();

            let options = PublishOptions {
                target,
                sitename,
                purge: !no_purge,
            };
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    println!("{}", output::format_upload_event(&event));
                }
            });
            let result = site.publish_build(build, &options, Some(tx));
            printer.join().map_err(|_| "upload printer thread panicked")?;
            let report = result?;
            println!();
            output::print_publish_output(&report);
            if let Err(e) = report.check_upload() {
                failure = Some(e.to_string());
            }
        }
        Command::SetupDns { target, sitename } => {
            println!("==> Setting up DNS for {}", target);
            let site = Site::open(&cli.root, None)?;
            let setup = site.setup_dns(&target, sitename.as_deref())?;
            output::print_dns_output(&setup);
        }
        Command::Clean => {
            println!("==> Cleaning build dir");
            SitePaths::new(&cli.root).clean_build_dir()?;
            println!("Done!");
        }
        Command::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        }
    }

    println!("{}", output::separator());
    match failure {
        Some(message) => Err(message.into()),
        None => Ok(()),
    }
}
