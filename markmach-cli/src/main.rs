use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use env_logger::Env;
use log::{info, warn};
use markmach_core::model::entropy::DEFAULT_THEMATIC_THRESHOLD;
use markmach_core::text::tokenizer::{join_tokens, save_tokenized, sorted_by_frequency, vocabulary};
use markmach_core::{
    AnswerGenerator, CorpusParser, GeneratorConfig, MarkovChain, ParsedCorpus, TokenEntropy, TrainConfig,
    Trainer, Tokenizer, TokenizerConfig,
};

const DEFAULT_MODEL: &str = "output/markov_model.json";
const DEFAULT_PARSED: &str = "output/result";
const EXIT_WORDS: &[&str] = &["exit", "quit", "выход"];

#[derive(Parser, Debug)]
#[command(author, version, about = "Markov chain question answering", long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q, -qq)
    #[arg(short = 'q', long, global = true, action = ArgAction::Count)]
    quiet: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Clean a text file and split it into sentences and paragraphs
    Parse(ParseArgs),
    /// Tokenize a parsed corpus and report vocabulary statistics
    Tokenize(TokenizeArgs),
    /// Train a Markov chain on a parsed corpus
    Train(TrainArgs),
    /// Answer questions interactively
    Chat(GenerateArgs),
    /// Answer a single question
    Ask(AskArgs),
    /// Show statistics and thematic tokens of a trained model
    Stats(StatsArgs),
}

#[derive(Args, Debug)]
struct ParseArgs {
    /// Text file to parse
    #[arg(short, long, value_name = "PATH")]
    file: PathBuf,

    /// Base path of the generated `_sentences.txt`, `_paragraphs.txt` and `_cleaned.txt`
    #[arg(short, long, value_name = "BASE", default_value = DEFAULT_PARSED)]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct TokenizeArgs {
    /// Base path of a parsed corpus
    #[arg(short, long, value_name = "BASE", default_value = DEFAULT_PARSED)]
    file: PathBuf,

    /// Keep punctuation as separate tokens
    #[arg(long)]
    punctuation: bool,

    /// Tokenize paragraphs instead of sentences
    #[arg(long)]
    paragraphs: bool,

    /// Base path of the tokenized output (`_tokens.txt`, `_vocabulary.txt`)
    #[arg(short, long, value_name = "BASE")]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Base path of a parsed corpus
    #[arg(short, long, value_name = "BASE", default_value = DEFAULT_PARSED)]
    file: PathBuf,

    /// Order of the chain (2 for bigrams, 3 for trigrams, ...)
    #[arg(long, value_name = "N", default_value_t = 3)]
    order: usize,

    /// Where to save the model (`.bin` for the binary format)
    #[arg(short, long, value_name = "PATH", default_value = DEFAULT_MODEL)]
    model: PathBuf,

    /// Train on paragraphs instead of sentences
    #[arg(long)]
    paragraphs: bool,

    /// Worker threads (0 uses every CPU)
    #[arg(long, value_name = "N", default_value_t = 1)]
    workers: usize,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Trained model to load
    #[arg(short, long, value_name = "PATH", default_value = DEFAULT_MODEL)]
    model: PathBuf,

    /// Maximum answer length in tokens
    #[arg(long, value_name = "TOKENS", default_value_t = 50)]
    length: usize,

    /// Entropy under which a token is thematic
    #[arg(long, value_name = "BITS", default_value_t = DEFAULT_THEMATIC_THRESHOLD)]
    entropy: f64,

    /// Seed for reproducible answers
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Consecutive steps without a known continuation before giving up
    #[arg(long, value_name = "COUNT", default_value_t = 10)]
    max_stalls: usize,

    /// Candidate sentences retrieved per question
    #[arg(long, value_name = "COUNT", default_value_t = 5)]
    search_limit: usize,
}

#[derive(Args, Debug)]
struct AskArgs {
    #[command(flatten)]
    generate: GenerateArgs,

    /// Question to answer
    #[arg(required = true)]
    question: Vec<String>,
}

#[derive(Args, Debug)]
struct StatsArgs {
    /// Trained model to load
    #[arg(short, long, value_name = "PATH", default_value = DEFAULT_MODEL)]
    model: PathBuf,

    /// Number of thematic tokens to list
    #[arg(long, value_name = "COUNT", default_value_t = 15)]
    top: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Parse(args) => run_parse(args),
        Commands::Tokenize(args) => run_tokenize(args),
        Commands::Train(args) => run_train(args),
        Commands::Chat(args) => run_chat(args),
        Commands::Ask(args) => run_ask(args),
        Commands::Stats(args) => run_stats(args),
    }
}

fn init_logging(verbose: u8, quiet: u8) {
    use log::LevelFilter;

    let level = if quiet > 0 {
        match quiet {
            1 => LevelFilter::Warn,
            _ => LevelFilter::Error,
        }
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    builder.filter_level(level);
    let _ = builder.try_init();
}

fn run_parse(args: ParseArgs) -> Result<()> {
    let corpus = CorpusParser::new()
        .parse_file(&args.file)
        .with_context(|| format!("failed to parse {}", args.file.display()))?;

    println!("Parsed file: {}", args.file.display());
    println!("Sentences: {}", corpus.sentences.len());
    println!("Paragraphs: {}", corpus.paragraphs.len());
    println!("Cleaned text length: {} characters", corpus.raw_text.chars().count());

    println!("\n=== First 3 sentences ===");
    for (i, sentence) in corpus.sentences.iter().take(3).enumerate() {
        println!("{}: {}", i + 1, sentence);
    }
    println!("\n=== First 2 paragraphs ===");
    for (i, paragraph) in corpus.paragraphs.iter().take(2).enumerate() {
        println!("{}: {}", i + 1, paragraph);
    }

    corpus
        .save(&args.output)
        .with_context(|| format!("failed to save parsed corpus under {}", args.output.display()))?;
    println!("\nResults saved to {}_*.txt", args.output.display());
    Ok(())
}

fn load_corpus(base: &Path) -> Result<ParsedCorpus> {
    ParsedCorpus::load(base).with_context(|| format!("failed to load parsed corpus {}", base.display()))
}

fn run_tokenize(args: TokenizeArgs) -> Result<()> {
    let corpus = load_corpus(&args.file)?;
    let tokenizer = Tokenizer::new(TokenizerConfig { keep_punctuation: args.punctuation, lowercase: true });

    let (units, kind) = if args.paragraphs {
        (&corpus.paragraphs, "paragraphs")
    } else {
        (&corpus.sentences, "sentences")
    };
    let tokenized = tokenizer.tokenize_sentences(units);
    if tokenized.is_empty() {
        return Err(anyhow!("no {kind} to tokenize in {}", args.file.display()));
    }

    let vocab = vocabulary(&tokenized);
    let total_tokens: usize = tokenized.iter().map(Vec::len).sum();
    println!("Tokenized {} {kind} (keep punctuation: {})", tokenized.len(), args.punctuation);
    println!("Vocabulary size: {} unique tokens", vocab.len());
    println!("Total tokens: {total_tokens}");
    println!("Average tokens per unit: {:.1}", total_tokens as f64 / tokenized.len() as f64);

    println!("\n=== First 3 tokenized {kind} ===");
    for (i, tokens) in tokenized.iter().take(3).enumerate() {
        println!("{}: {:?}", i + 1, tokens);
        println!("   Reconstructed: {}", join_tokens(&tokens[1..tokens.len() - 1]));
    }

    let frequencies = sorted_by_frequency(&vocab);
    println!("\n=== Top 20 most frequent tokens ===");
    for (token, frequency) in frequencies.iter().take(20) {
        println!("  {token}: {frequency}");
    }

    if let Some(output) = &args.output {
        save_tokenized(output, &tokenized)
            .with_context(|| format!("failed to save tokenized data under {}", output.display()))?;
        println!("\nTokenized data saved to {}_*.txt", output.display());
    }
    Ok(())
}

fn run_train(args: TrainArgs) -> Result<()> {
    let corpus = load_corpus(&args.file)?;
    let units = if args.paragraphs { &corpus.paragraphs } else { &corpus.sentences };
    let tokenized = Tokenizer::default().tokenize_sentences(units);

    let trainer = Trainer::new(TrainConfig { order: args.order, workers: args.workers })
        .context("invalid training configuration")?;
    let chain = trainer.train(&tokenized).context("training failed")?;
    chain
        .save(&args.model)
        .with_context(|| format!("failed to save model to {}", args.model.display()))?;

    println!("\n=== Model statistics ===");
    println!("{}", chain.stats());

    println!("\n=== Chain examples ===");
    let mut examples: Vec<_> = chain.states().collect();
    examples.sort_by(|a, b| a.0.cmp(b.0));
    for (prefix, state) in examples.into_iter().take(5) {
        let successors: Vec<String> = state
            .transitions()
            .map(|(token, count)| format!("{token}({count})"))
            .collect();
        println!("Prefix: {prefix} -> {}", successors.join(" "));
    }
    Ok(())
}

fn load_generator(args: &GenerateArgs) -> Result<AnswerGenerator> {
    let chain = MarkovChain::load(&args.model)
        .with_context(|| format!("failed to load model from {}", args.model.display()))?;

    let mut config = GeneratorConfig::default();
    config.max_length = args.length;
    config.search_limit = args.search_limit;
    config.max_stalls = args.max_stalls;
    config.set_thematic_threshold(args.entropy).map_err(|e| anyhow!(e))?;

    let chain = Arc::new(chain);
    Ok(match args.seed {
        Some(seed) => AnswerGenerator::with_seed(chain, config, seed),
        None => AnswerGenerator::new(chain, config),
    })
}

fn run_chat(args: GenerateArgs) -> Result<()> {
    let mut generator = load_generator(&args)?;
    info!("Type a question, or one of {EXIT_WORDS:?} to leave");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut lines = stdin.lock().lines();
    loop {
        print!("Вопрос: ");
        stdout.flush().context("failed to flush stdout")?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to read input: {e}");
                break;
            }
        };

        let question = line.trim();
        if EXIT_WORDS.contains(&question) {
            println!("До свидания!");
            break;
        }
        if question.is_empty() {
            continue;
        }

        println!("Ответ: {}\n", generator.generate_answer(question));
    }
    Ok(())
}

fn run_ask(args: AskArgs) -> Result<()> {
    let mut generator = load_generator(&args.generate)?;
    let question = args.question.join(" ");
    println!("{}", generator.generate_answer(&question));
    Ok(())
}

fn run_stats(args: StatsArgs) -> Result<()> {
    let chain = MarkovChain::load(&args.model)
        .with_context(|| format!("failed to load model from {}", args.model.display()))?;
    println!("=== Model statistics ===");
    println!("{}", chain.stats());

    let entropy = TokenEntropy::analyze(&chain, DEFAULT_THEMATIC_THRESHOLD);
    if let Some((min, max)) = entropy.range() {
        println!("entropy_range: [{min:.3}, {max:.3}]");
    }

    println!("\n=== Top {} thematic tokens ===", args.top);
    for (token, value) in entropy.most_thematic(args.top) {
        let marker = if entropy.is_thematic(token) { "*" } else { " " };
        println!("{marker} {token}: {value:.3}");
    }
    Ok(())
}
