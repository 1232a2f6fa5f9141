use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use qcarta_protocol::LayerFlags;
use qcarta_protocol::constants::DEFAULT_PORT;

#[derive(Parser, Debug)]
#[command(name = "qcarta", version)]
#[command(about = "Publish QGIS projects to a QCarta server", long_about = None)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        env = "QCARTA_CONFIG",
        help = "Server configuration file [default: ~/.qcarta_uploader_config.json]"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        short,
        global = true,
        help = "Server profile to use instead of the selected one"
    )]
    pub server: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(subcommand, about = "Manage server profiles")]
    Server(ServerCommand),

    #[command(about = "List the stores on the server")]
    Stores,

    #[command(about = "List the access groups on the server")]
    Groups,

    #[command(about = "List the basemaps on the server")]
    Basemaps,

    #[command(about = "Create a store from a QGIS project")]
    Create(CreateArgs),

    #[command(about = "Upload new and modified files of a project to its store")]
    Update(UpdateArgs),

    #[command(about = "Publish a layer from a store")]
    Publish(PublishArgs),
}

#[derive(Subcommand, Debug)]
pub enum ServerCommand {
    #[command(about = "Add a server profile, or replace one with --replace")]
    Add {
        name: String,
        #[arg(long)]
        host: String,
        #[arg(long, short)]
        username: String,
        #[arg(long, short, env = "QCARTA_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, default_value_t = DEFAULT_PORT, help = "443 selects https, anything else http")]
        port: u16,
        #[arg(long, value_name = "OLD_NAME", help = "Profile to replace (allows renaming)")]
        replace: Option<String>,
        #[arg(long, help = "Check the credentials before saving")]
        test: bool,
    },

    #[command(about = "Remove a server profile")]
    Remove { name: String },

    #[command(about = "List server profiles")]
    List,

    #[command(about = "Select the default server profile")]
    Use { name: String },

    #[command(about = "Log in to check a server profile")]
    Test { name: Option<String> },
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[arg(help = "QGIS project file, or the directory containing it")]
    pub project: PathBuf,

    #[arg(long, help = "Store name [default: project file or directory name]")]
    pub name: Option<String>,

    #[arg(
        long = "group",
        value_name = "ID",
        default_value = "1",
        help = "Access group id (repeatable)"
    )]
    pub groups: Vec<String>,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    #[arg(help = "Name of the store to update")]
    pub store: String,

    #[arg(help = "QGIS project file, or the directory containing it")]
    pub project: PathBuf,
}

#[derive(Args, Debug)]
pub struct PublishArgs {
    #[arg(help = "Name of the store to publish from")]
    pub store: String,

    #[arg(long, help = "Layer name")]
    pub name: String,

    #[arg(long, default_value = "")]
    pub description: String,

    #[arg(
        long = "layer",
        value_name = "LAYER",
        help = "QGIS layer to include (repeatable) [default: all]"
    )]
    pub layers: Vec<String>,

    #[arg(long, help = "Print layout [default: alphabetically first]")]
    pub layout: Option<String>,

    #[arg(long, value_name = "ID")]
    pub basemap: Option<String>,

    #[arg(long = "group", value_name = "ID", required = true, help = "Access group id (repeatable)")]
    pub groups: Vec<String>,

    #[command(flatten)]
    pub flags: FlagArgs,
}

#[derive(Args, Debug, Default)]
pub struct FlagArgs {
    #[arg(long)]
    pub public: bool,
    #[arg(long)]
    pub cached: bool,
    #[arg(long, help = "Serve through MapProxy")]
    pub proxyfied: bool,
    #[arg(long)]
    pub customized: bool,
    #[arg(long, help = "Expose layers separately (needs --proxyfied)")]
    pub exposed: bool,
    #[arg(long)]
    pub auto_thumbnail: bool,
    #[arg(long)]
    pub show_charts: bool,
    #[arg(long)]
    pub show_dt: bool,
    #[arg(long)]
    pub show_query: bool,
    #[arg(long)]
    pub show_fi_edit: bool,
}

impl From<&FlagArgs> for LayerFlags {
    fn from(f: &FlagArgs) -> Self {
        LayerFlags {
            public: f.public,
            cached: f.cached,
            proxyfied: f.proxyfied,
            customized: f.customized,
            exposed: f.exposed,
            auto_thumbnail: f.auto_thumbnail,
            show_charts: f.show_charts,
            show_dt: f.show_dt,
            show_query: f.show_query,
            show_fi_edit: f.show_fi_edit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn create_defaults_to_group_one() {
        let cli = Cli::try_parse_from(["qcarta", "create", "/tmp/city.qgs"]).unwrap();
        let Command::Create(args) = cli.command else {
            panic!("expected create");
        };
        assert_eq!(args.groups, vec!["1"]);
        assert_eq!(args.name, None);
    }

    #[test]
    fn publish_flags() {
        let cli = Cli::try_parse_from([
            "qcarta",
            "--server",
            "prod",
            "publish",
            "city",
            "--name",
            "City",
            "--group",
            "2",
            "--layer",
            "roads",
            "--proxyfied",
            "--exposed",
        ])
        .unwrap();
        assert_eq!(cli.server.as_deref(), Some("prod"));
        let Command::Publish(args) = cli.command else {
            panic!("expected publish");
        };
        let flags = LayerFlags::from(&args.flags);
        assert!(flags.proxyfied && flags.exposed);
        assert!(!flags.public);
        assert_eq!(args.layers, vec!["roads"]);
    }

    #[test]
    fn server_add_port_default() {
        let cli = Cli::try_parse_from([
            "qcarta", "server", "add", "prod", "--host", "maps.example.org", "-u", "ann", "-p",
            "pw",
        ])
        .unwrap();
        let Command::Server(ServerCommand::Add { port, replace, .. }) = cli.command else {
            panic!("expected server add");
        };
        assert_eq!(port, 443);
        assert_eq!(replace, None);
    }
}
