use clap::{Args, Parser, Subcommand, ValueEnum};

/// Text-to-SQL - Ask questions in plain language and run the generated SQL
#[derive(Parser, Debug)]
#[command(name = "text-to-sql")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands
}

/// Options shared by every command
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Output format
    #[arg(short = 'f', long = "format", value_enum, default_value = "text", global = true)]
    pub output_format: Format,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging and show applied rewrite rules
    #[arg(short, long, global = true)]
    pub verbose: bool
}

/// LLM and warehouse options for commands that generate or execute SQL
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Warehouse connection URL
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Schema whose tables are described to the model
    #[arg(long)]
    pub db_schema: Option<String>,

    /// LLM provider to use
    #[arg(short, long, value_enum)]
    pub provider: Option<Provider>,

    /// API key for Gemini, OpenAI or Anthropic
    #[arg(short, long, env = "LLM_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model name
    #[arg(short, long)]
    pub model: Option<String>,

    /// Ollama base URL
    #[arg(long)]
    pub ollama_url: Option<String>,

    /// Maximum squared embedding distance for a cache hit
    #[arg(long)]
    pub threshold: Option<f32>
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate SQL for a question, then run it and show its plan
    Ask {
        /// Question in plain language
        question: String,

        /// Only show the generated SQL
        #[arg(long)]
        no_execute: bool,

        #[command(flatten)]
        connection: ConnectionArgs
    },

    /// Interactive session; the semantic cache lives until you quit
    Shell {
        /// Only show the generated SQL
        #[arg(long)]
        no_execute: bool,

        #[command(flatten)]
        connection: ConnectionArgs
    },

    /// Generate and rewrite SQL without executing it
    Generate {
        /// Question in plain language
        question: String,

        #[command(flatten)]
        connection: ConnectionArgs
    },

    /// Apply the dialect rewrite to a statement (use - for stdin)
    Rewrite {
        /// SQL statement
        #[arg(default_value = "-")]
        sql: String
    },

    /// Execute a statement and show its plan (use - for stdin)
    Run {
        /// SQL statement
        #[arg(default_value = "-")]
        sql: String,

        /// Warehouse connection URL
        #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
        database_url: Option<String>
    },

    /// Print the schema catalog
    Schema {
        /// Warehouse connection URL
        #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
        database_url: Option<String>,

        /// Schema to describe
        #[arg(long)]
        db_schema: Option<String>
    },

    /// List the columns of one table
    Columns {
        /// Table name (matched case-insensitively)
        table: String,

        /// Warehouse connection URL
        #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
        database_url: Option<String>,

        /// Schema containing the table
        #[arg(long)]
        db_schema: Option<String>
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    Gemini,
    OpenAI,
    Anthropic,
    Ollama
}

impl Provider {
    /// Get default model for provider
    pub fn default_model(&self) -> &str {
        match self {
            Self::Gemini => "gemini-2.0-flash-001",
            Self::OpenAI => "gpt-4o",
            Self::Anthropic => "claude-sonnet-4-20250514",
            Self::Ollama => "llama3.2"
        }
    }

    /// Parse a provider name from configuration
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Some(Self::Gemini),
            "openai" | "open-ai" => Some(Self::OpenAI),
            "anthropic" => Some(Self::Anthropic),
            "ollama" => Some(Self::Ollama),
            _ => None
        }
    }

    /// Whether requests need an API key
    pub fn needs_api_key(&self) -> bool {
        !matches!(self, Self::Ollama)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
    Yaml
}
