use clap::Args as ClapArgs;

const DEFAULT_API_URL: &str = "https://sidebar.stract.to/api";
const OUTPUT_DIR: &str = "./reports";

#[derive(ClapArgs, Clone, Debug)]
pub struct Config {
    #[arg(long, default_value=DEFAULT_API_URL, env = "API_URL")]
    pub(crate) api_url: String,

    #[arg(long, env = "API_TOKEN")]
    pub(crate) api_token: String,

    #[arg(long, default_value=OUTPUT_DIR, env = "OUTPUT_DIR")]
    pub(crate) output_dir: String,
}
