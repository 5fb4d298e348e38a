use argp::FromArgs;

/// Inspect, resize and compose Supreme Commander map containers.
#[derive(FromArgs, Debug)]
pub struct ScmapTool {
    /// Logging verbosity, 1 (errors only) through 5 (trace).
    #[argp(option, short = 'v', default = "0")]
    pub verbose: usize,

    #[argp(subcommand)]
    pub nested: Commands,
}

#[derive(FromArgs, Debug)]
#[argp(subcommand)]
pub enum Commands {
    Info(InfoData),
    Resize(ResizeData),
    Import(ImportData),
    Dump(DumpData),
}

/// Print a summary of a map container
#[derive(FromArgs, Debug)]
#[argp(subcommand, name = "info")]
pub struct InfoData {
    /// Map file to inspect
    #[argp(option, short = 'i')]
    pub input: String,
}

/// Rescale a map to a new extent
#[derive(FromArgs, Debug)]
#[argp(subcommand, name = "resize")]
pub struct ResizeData {
    /// Map file to resize
    #[argp(option, short = 'i')]
    pub input: String,

    /// Output file to write to
    #[argp(option, short = 'o')]
    pub output: Option<String>,

    /// New width in map cells
    #[argp(option, short = 'W')]
    pub width: i32,

    /// New height in map cells
    #[argp(option, short = 'H')]
    pub height: i32,
}

/// Composite a source map into a target map
#[derive(FromArgs, Debug)]
#[argp(subcommand, name = "import")]
pub struct ImportData {
    /// Source map to composite from
    #[argp(option, short = 'i')]
    pub input: String,

    /// Target map to composite into
    #[argp(option, short = 't')]
    pub target: String,

    /// Output file to write to
    #[argp(option, short = 'o')]
    pub output: Option<String>,

    /// Column offset of the imported region
    #[argp(option, short = 'x', default = "0")]
    pub column: i32,

    /// Row offset of the imported region
    #[argp(option, short = 'y', default = "0")]
    pub row: i32,

    /// Accumulate the imported heightmap instead of replacing it
    #[argp(switch, short = 'a')]
    pub additive: bool,
}

/// Extract the embedded textures and raw planes of a map
#[derive(FromArgs, Debug)]
#[argp(subcommand, name = "dump")]
pub struct DumpData {
    /// Map file to extract from
    #[argp(option, short = 'i')]
    pub input: String,

    /// Prefix for the extracted files
    #[argp(option, short = 'o')]
    pub prefix: Option<String>,
}
