//! CLI command definitions, routing, shell loop and tracing setup.

use std::collections::BTreeSet;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use tracing::info;

use spaghetto_engine::arithmetic::{format_cents, format_rate, format_week, parse_dollars, plural};
use spaghetto_engine::domain::{Dish, GameState, Ingredient, Item, TransactionKind, TransitionResult};
use spaghetto_engine::inventory::fuzzy_match;
use spaghetto_engine::loans::Loan;
use spaghetto_engine::menu::{cost_of_dish, servings_available};

use spaghetto_runtime::config::{init_config, load_config, load_config_from, to_toml, AppConfig};
use spaghetto_runtime::prompt::Prompter;
use spaghetto_runtime::session::{Session, VerifyReport};
use spaghetto_runtime::snapshot_codec::{import_snapshot_from_file, snapshot_hash};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Spaghetto — manage a restaurant's books, kitchen and loans.
#[derive(Parser)]
#[command(
    name = "spaghetto",
    version,
    about = "Manage a restaurant's books, kitchen and loans, one week at a time.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.spaghetto/spaghetto.toml).
    #[arg(long, global = true, env = "SPAGHETTO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding saved games.
    #[arg(long, global = true)]
    pub save_dir: Option<PathBuf>,

    /// Name of the game to play.
    #[arg(short, long, global = true, env = "SPAGHETTO_GAME", default_value = "default")]
    pub game: String,

    /// Fixed RNG seed for demand and loan offers.
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Start a new game.
    New,

    /// Show the state of the business.
    Status,

    /// Put the owner's money into the business.
    Deposit {
        /// Amount in dollars.
        amount: String,
        #[arg(long, default_value = "Owner Deposit")]
        title: String,
    },

    /// Take money out of the business.
    Withdraw {
        /// Amount in dollars.
        amount: String,
        #[arg(long, default_value = "Owner Withdrawal")]
        title: String,
    },

    /// Buy stock for the kitchen.
    Buy {
        name: String,
        quantity: i64,
        unit: String,
        /// Total price in dollars.
        price: String,
    },

    /// Record stock already on hand without paying for it.
    Stock {
        name: String,
        quantity: i64,
        unit: String,
        /// Book value of the stock in dollars.
        #[arg(long, default_value = "0")]
        value: String,
    },

    /// Throw away spoiled stock, cheapest first.
    Discard { name: String, quantity: i64 },

    /// List or manage the inventory.
    Inventory {
        #[command(subcommand)]
        action: Option<InventoryAction>,
    },

    /// Manage the menu.
    Dish {
        #[command(subcommand)]
        action: DishAction,
    },

    /// Hire employees.
    Hire {
        #[arg(default_value_t = 1)]
        count: i64,
    },

    /// Let employees go.
    Fire {
        #[arg(default_value_t = 1)]
        count: i64,
    },

    /// Browse and take out loans.
    Loans {
        #[command(subcommand)]
        action: Option<LoanAction>,
    },

    /// Run the restaurant for some weeks.
    Step {
        #[arg(default_value_t = 1)]
        weeks: u32,
    },

    /// Show the ledger.
    History {
        /// Only the most recent N transactions.
        #[arg(long)]
        limit: Option<usize>,
        /// Only transactions from this week number on (0 = first week).
        #[arg(long)]
        after: Option<i64>,
        /// Only transactions of this kind.
        #[arg(long)]
        kind: Option<HistoryKind>,
    },

    /// Write a snapshot of the game now.
    Save,

    /// Replay the event log and check it against the saved snapshots.
    Verify,

    /// Write the current state as a portable save file.
    Export { path: PathBuf },

    /// Check and summarise an exported save file.
    Inspect { path: PathBuf },

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Interactive session.
    Shell,
}

#[derive(Subcommand)]
pub(crate) enum InventoryAction {
    /// List items in stock.
    List,
    /// Drop an item no dish uses.
    Remove {
        name: String,
        /// Skip confirmation.
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub(crate) enum DishAction {
    /// Add a dish. Prompts for the price and ingredients when not given.
    Add {
        name: String,
        /// Price in dollars.
        price: Option<String>,
        /// One serving's ingredient, repeatable.
        #[arg(short, long = "ingredient", value_name = "ITEM=QTY[:UNIT]")]
        ingredients: Vec<String>,
    },
    /// List the menu.
    List,
    /// Show a dish by number or name.
    Show { dish: String },
    /// Take a dish off the menu.
    Remove {
        dish: String,
        /// Skip confirmation.
        #[arg(short, long)]
        yes: bool,
    },
    /// Change a dish's price.
    Price {
        dish: String,
        /// New price in dollars.
        price: String,
    },
}

#[derive(Subcommand)]
pub(crate) enum LoanAction {
    /// Active loans and current offers.
    List,
    /// Ask the bank for new offers.
    Refresh,
    /// Take an offered loan by number or name.
    Accept { name: String },
    /// Details of a loan or offer.
    Show { name: String },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum HistoryKind {
    Deposit,
    Purchase,
    Sales,
    Payroll,
    Loan,
    Subsidy,
    Repayment,
}

impl From<HistoryKind> for TransactionKind {
    fn from(kind: HistoryKind) -> Self {
        match kind {
            HistoryKind::Deposit => TransactionKind::Deposit,
            HistoryKind::Purchase => TransactionKind::Purchase,
            HistoryKind::Sales => TransactionKind::Sales,
            HistoryKind::Payroll => TransactionKind::Payroll,
            HistoryKind::Loan => TransactionKind::Loan,
            HistoryKind::Subsidy => TransactionKind::Subsidy,
            HistoryKind::Repayment => TransactionKind::Repayment,
        }
    }
}

/// One line typed into the shell.
#[derive(Parser)]
#[command(name = "", no_binary_name = true, disable_version_flag = true)]
struct ShellLine {
    #[command(subcommand)]
    command: Command,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = match cli.verbose {
        0 => "spaghetto=warn,spaghetto_runtime=warn",
        1 => "spaghetto=info,spaghetto_runtime=info",
        2 => "spaghetto=debug,spaghetto_runtime=debug,spaghetto_engine=debug",
        _ => "spaghetto=trace,spaghetto_runtime=trace,spaghetto_engine=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Resolved config plus where the game lives.
struct Settings {
    config: AppConfig,
    save_dir: PathBuf,
    game: String,
}

impl Settings {
    fn resolve(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => load_config_from(path)?,
            None => load_config()?,
        };
        if let Some(seed) = cli.seed {
            config.simulation.seed = Some(seed);
        }
        let save_dir = match &cli.save_dir {
            Some(dir) => dir.clone(),
            None => config.save_dir()?,
        };
        Ok(Self {
            config,
            save_dir,
            game: cli.game.clone(),
        })
    }

    fn open_existing(&self) -> Result<Session> {
        if !Session::exists(&self.save_dir, &self.game) {
            return Err(eyre!(
                "no saved game named {:?}; start one with `spaghetto new`",
                self.game
            ));
        }
        Ok(Session::open(&self.save_dir, &self.game, &self.config)?)
    }
}

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    if let Command::Config { action } = &cli.command {
        return cmd_config(action, cli.config.as_deref());
    }
    if let Command::Inspect { path } = &cli.command {
        return cmd_inspect(path);
    }

    let settings = Settings::resolve(&cli)?;
    match cli.command {
        Command::New => cmd_new(&settings),
        Command::Shell => cmd_shell(&settings),
        command => {
            let mut session = settings.open_existing()?;
            let start = session.current_sequence();
            let stdin = io::stdin();
            let mut prompter = Prompter::new(stdin.lock(), io::stdout());
            let outcome = execute(&mut session, command, &mut prompter);
            if session.current_sequence() != start {
                session.save()?;
            }
            outcome
        }
    }
}

/// Run one game command against an open session.
fn execute<R: BufRead, W: Write>(
    session: &mut Session,
    command: Command,
    prompter: &mut Prompter<R, W>,
) -> Result<()> {
    match command {
        Command::New | Command::Shell => {
            println!("Already playing {:?}.", session.game_id());
            Ok(())
        }
        Command::Config { action } => cmd_config(&action, None),
        Command::Inspect { path } => cmd_inspect(&path),
        Command::Status => {
            print_status(session.game_id(), session.state())?;
            Ok(())
        }
        Command::Deposit { amount, title } => {
            let cents = parse_dollars(&amount)?;
            session.deposit(&title, cents)?;
            println!("Deposited {}.", format_cents(cents));
            println!("Balance: {}", format_cents(session.state().balance));
            Ok(())
        }
        Command::Withdraw { amount, title } => {
            let cents = parse_dollars(&amount)?;
            session.withdraw(&title, cents)?;
            println!("Withdrew {}.", format_cents(cents));
            println!("Balance: {}", format_cents(session.state().balance));
            Ok(())
        }
        Command::Buy {
            name,
            quantity,
            unit,
            price,
        } => {
            let item = Item {
                name: name.trim().to_string(),
                quantity,
                unit,
                price: parse_dollars(&price)?,
            };
            session.buy_item(item.clone())?;
            println!("Bought {} for {}.", item, format_cents(item.price));
            println!("Balance: {}", format_cents(session.state().balance));
            Ok(())
        }
        Command::Stock {
            name,
            quantity,
            unit,
            value,
        } => {
            let item = Item {
                name: name.trim().to_string(),
                quantity,
                unit,
                price: parse_dollars(&value)?,
            };
            session.stock_item(item.clone())?;
            println!("Stocked {}.", item);
            Ok(())
        }
        Command::Discard { name, quantity } => {
            let name = stocked_item(session.state(), &name)?;
            let result = session.discard_item(&name, quantity)?;
            println!(
                "Discarded {} of {} worth {}.",
                quantity,
                name,
                format_cents(result.cost_of_goods)
            );
            Ok(())
        }
        Command::Inventory { action } => match action.unwrap_or(InventoryAction::List) {
            InventoryAction::List => print_inventory(session.state()),
            InventoryAction::Remove { name, yes } => {
                let name = stocked_item(session.state(), &name)?;
                if !yes && !confirmed(prompter, &format!("Remove {} from the inventory? ", name))? {
                    println!("Cancelled deletion.");
                    return Ok(());
                }
                session.remove_item(&name)?;
                println!("Removed {}.", name);
                Ok(())
            }
        },
        Command::Dish { action } => execute_dish(session, action, prompter),
        Command::Hire { count } => {
            session.hire(count)?;
            println!(
                "Hired {} {}; {} on staff.",
                count,
                plural("employee", count),
                session.state().employee_count
            );
            Ok(())
        }
        Command::Fire { count } => {
            session.fire(count)?;
            println!(
                "Let {} {} go; {} on staff.",
                count,
                plural("employee", count),
                session.state().employee_count
            );
            Ok(())
        }
        Command::Loans { action } => execute_loans(session, action.unwrap_or(LoanAction::List)),
        Command::Step { weeks } => {
            let first_week = session.state().total_weeks;
            let results = session.advance_weeks(weeks)?;
            for (offset, result) in results.iter().enumerate() {
                print_week(first_week + offset as i64, result);
            }
            println!("Balance: {}", format_cents(session.state().balance));
            Ok(())
        }
        Command::History { limit, after, kind } => {
            let kind = kind.map(TransactionKind::from);
            let state = session.state();
            let rows = state.get_transactions(limit, after, |t| kind.map_or(true, |k| t.kind == k));
            if rows.is_empty() {
                println!("No transactions.");
            }
            for t in rows {
                println!("{}", t);
            }
            Ok(())
        }
        Command::Save => {
            let path = session.save()?;
            println!("Saved to {}", path.display());
            Ok(())
        }
        Command::Verify => {
            print_verify(&session.verify()?);
            Ok(())
        }
        Command::Export { path } => {
            session.export(&path)?;
            println!("Exported to {}", path.display());
            Ok(())
        }
    }
}

fn execute_dish<R: BufRead, W: Write>(
    session: &mut Session,
    action: DishAction,
    prompter: &mut Prompter<R, W>,
) -> Result<()> {
    match action {
        DishAction::Add {
            name,
            price,
            ingredients,
        } => {
            let price = match price {
                Some(price) => parse_dollars(&price)?,
                None => match prompter.ask_money("What is the price of the dish? $", Some(0), None)? {
                    Some(cents) => cents,
                    None => {
                        println!("Cancelled creation.");
                        return Ok(());
                    }
                },
            };
            let ingredients = if ingredients.is_empty() {
                match ask_ingredients(session.state(), prompter)? {
                    Some(list) => list,
                    None => {
                        println!("Cancelled creation.");
                        return Ok(());
                    }
                }
            } else {
                ingredients
                    .iter()
                    .map(|s| parse_ingredient(session.state(), s))
                    .collect::<Result<Vec<_>>>()?
            };
            session.add_dish(Dish {
                name: name.clone(),
                price,
                ingredients,
            })?;
            println!("Your dish has been created!");
            Ok(())
        }
        DishAction::List => {
            let state = session.state();
            if state.dishes.is_empty() {
                println!("The menu is empty.");
            } else {
                println!("Menu:");
            }
            for (i, dish) in state.dishes.numbered() {
                println!("{}: {} ({})", i, dish.name, format_cents(dish.price));
            }
            Ok(())
        }
        DishAction::Show { dish } => {
            let state = session.state();
            let dish = find_dish(state, &dish)?;
            print_dish(state, dish)
        }
        DishAction::Remove { dish, yes } => {
            let name = find_dish(session.state(), &dish)?.name.clone();
            if !yes && !confirmed(prompter, &format!("Remove {} from the menu? ", name))? {
                println!("Cancelled deletion.");
                return Ok(());
            }
            session.remove_dish(&name)?;
            println!("Deleted dish!");
            Ok(())
        }
        DishAction::Price { dish, price } => {
            let name = find_dish(session.state(), &dish)?.name.clone();
            let price = parse_dollars(&price)?;
            session.set_dish_price(&name, price)?;
            println!("{} now costs {}.", name, format_cents(price));
            Ok(())
        }
    }
}

fn execute_loans(session: &mut Session, action: LoanAction) -> Result<()> {
    match action {
        LoanAction::List => print_loans(session.state()),
        LoanAction::Refresh => {
            session.refresh_loan_offers()?;
            print_loans(session.state())
        }
        LoanAction::Accept { name } => {
            let state = session.state();
            let name = find_loan(state.loan_offers.values(), &name)
                .ok_or_else(|| eyre!("no offer matches {:?}", name))?
                .name
                .clone();
            session.accept_loan(&name)?;
            println!("Accepted {}.", name);
            println!("Balance: {}", format_cents(session.state().balance));
            Ok(())
        }
        LoanAction::Show { name } => {
            let state = session.state();
            let loan = find_loan(state.loans.values(), &name)
                .or_else(|| find_loan(state.loan_offers.values(), &name))
                .ok_or_else(|| eyre!("no loan or offer matches {:?}", name))?;
            print_loan_details(state, loan)
        }
    }
}

// ---------------------------------------------------------------------------
// Commands without a session
// ---------------------------------------------------------------------------

fn cmd_new(settings: &Settings) -> Result<()> {
    if Session::exists(&settings.save_dir, &settings.game) {
        return Err(eyre!("a game named {:?} already exists", settings.game));
    }
    let session = Session::open(&settings.save_dir, &settings.game, &settings.config)?;
    session.save()?;
    info!(game = %settings.game, dir = %session.dir().display(), "game started");
    println!("Opened {:?}.", settings.game);
    print_status(session.game_id(), session.state())
}

fn cmd_config(action: &ConfigAction, path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Init => {
            let path = init_config(path)?;
            println!("Config initialized at: {}", path.display());
        }
        ConfigAction::Show => {
            let config = match path {
                Some(p) => load_config_from(p)?,
                None => load_config()?,
            };
            println!("{}", to_toml(&config)?);
        }
    }
    Ok(())
}

fn cmd_inspect(path: &Path) -> Result<()> {
    let state = import_snapshot_from_file(path)?;
    println!("Save file: {}", path.display());
    println!("Hash:      {}", snapshot_hash(&state)?);
    print_status("exported game", &state)
}

// ---------------------------------------------------------------------------
// Shell
// ---------------------------------------------------------------------------

const SHELL_HELP: &str = "\
Type a command as you would after `spaghetto`, e.g. `dish list` or `step 4`.
`help` lists commands, `<command> --help` explains one, `back` leaves.";

fn cmd_shell(settings: &Settings) -> Result<()> {
    let mut session = Session::open(&settings.save_dir, &settings.game, &settings.config)?;
    let stdin = io::stdin();
    let mut prompter = Prompter::new(stdin.lock(), io::stdout());
    shell_loop(&mut session, &mut prompter)?;
    session.save()?;
    Ok(())
}

fn shell_loop<R: BufRead, W: Write>(session: &mut Session, prompter: &mut Prompter<R, W>) -> Result<()> {
    prompter.println(&format!("Managing {:?}.", session.game_id()))?;
    prompter.println(SHELL_HELP)?;

    loop {
        let date = format_week(session.state().total_weeks);
        let Some(line) = prompter.ask(&format!("{} > ", date))? else {
            break;
        };
        let words = match split_words(&line) {
            Ok(words) => words,
            Err(msg) => {
                prompter.println(&msg)?;
                continue;
            }
        };
        match words.first().map(String::as_str) {
            None => continue,
            Some("back") | Some("exit") | Some("quit") => break,
            Some("?") => {
                prompter.println(SHELL_HELP)?;
                continue;
            }
            Some(_) => {}
        }

        match ShellLine::try_parse_from(&words) {
            Ok(parsed) => {
                if let Err(e) = execute(session, parsed.command, prompter) {
                    prompter.println(&format!("Error: {}", e))?;
                }
            }
            Err(e) => prompter.println(&e.render().to_string())?,
        }
    }
    Ok(())
}

/// Split a shell line into words, honouring single and double quotes.
fn split_words(line: &str) -> std::result::Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if quote.is_some() {
        return Err("Unclosed quote.".to_string());
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

fn confirmed<R: BufRead, W: Write>(prompter: &mut Prompter<R, W>, question: &str) -> io::Result<bool> {
    Ok(prompter.confirm(question)?.unwrap_or(false))
}

// ---------------------------------------------------------------------------
// Lookup helpers
// ---------------------------------------------------------------------------

/// The stocked item `key` refers to.
fn stocked_item(state: &GameState, key: &str) -> Result<String> {
    state
        .inventory
        .find(key)
        .map(|item| item.name.clone())
        .ok_or_else(|| eyre!("No such item {:?}. Type `inventory` to see what is in stock.", key.trim()))
}

fn find_dish<'a>(state: &'a GameState, key: &str) -> Result<&'a Dish> {
    state.dishes.lookup(key).ok_or_else(|| {
        if key.trim().parse::<usize>().is_ok() {
            eyre!("That index does not exist!")
        } else {
            eyre!("That dish name does not exist! Type `dish list` to see the menu.")
        }
    })
}

/// A loan by 1-based position or (fuzzy) name.
fn find_loan<'a>(loans: impl Iterator<Item = &'a Loan> + Clone, key: &str) -> Option<&'a Loan> {
    if let Ok(index) = key.trim().parse::<usize>() {
        return index.checked_sub(1).and_then(|i| loans.clone().nth(i));
    }
    let name = fuzzy_match(key, loans.clone().map(|l| l.name.as_str()))?;
    loans.into_iter().find(|l| l.name == name)
}

/// Parse `ITEM=QTY` or `ITEM=QTY:UNIT`; the unit defaults to the
/// stocked item's unit.
fn parse_ingredient(state: &GameState, arg: &str) -> Result<Ingredient> {
    let (name, amount) = arg
        .split_once('=')
        .ok_or_else(|| eyre!("ingredient {:?} should look like ITEM=QTY[:UNIT]", arg))?;
    let (quantity, unit) = match amount.split_once(':') {
        Some((q, u)) => (q, Some(u.trim().to_string())),
        None => (amount, None),
    };
    let quantity: i64 = quantity
        .trim()
        .parse()
        .map_err(|_| eyre!("ingredient {:?} has a bad quantity", arg))?;

    let stocked = state.inventory.find(name);
    let name = stocked
        .map(|item| item.name.clone())
        .unwrap_or_else(|| name.trim().to_string());
    let unit = match (unit, stocked) {
        (Some(unit), _) => unit,
        (None, Some(item)) => item.unit.clone(),
        (None, None) => return Err(eyre!("{:?} is not stocked; give its unit as {}=QTY:UNIT", name, name)),
    };
    Ok(Ingredient {
        name,
        quantity,
        unit,
    })
}

/// Ask for ingredients one at a time. `None` when cancelled before
/// the first one.
fn ask_ingredients<R: BufRead, W: Write>(
    state: &GameState,
    prompter: &mut Prompter<R, W>,
) -> Result<Option<Vec<Ingredient>>> {
    prompter.println("What items does your dish use?")?;
    let mut ingredients = Vec::new();
    loop {
        let end = if ingredients.is_empty() { "cancel" } else { "finish" };
        let prompt = format!("Item #{} (type nothing to {}): ", ingredients.len() + 1, end);
        let Some(key) = prompter.ask_cancellable(&prompt)? else {
            break;
        };
        let (name, unit) = match state.inventory.find(&key) {
            Some(item) => (item.name.clone(), item.unit.clone()),
            None => {
                let unit = prompter.ask_cancellable("What unit is this item measured in? ")?;
                match unit {
                    Some(unit) => (key, unit),
                    None => continue,
                }
            }
        };
        let question = format!("How many {} does one serving use? ", plural(&unit, 2));
        let Some(quantity) = prompter.ask_integer(&question, Some(1), None)? else {
            break;
        };
        ingredients.push(Ingredient {
            name,
            quantity,
            unit,
        });
    }
    Ok((!ingredients.is_empty()).then_some(ingredients))
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_status(game: &str, state: &GameState) -> Result<()> {
    let metrics = state.metrics();
    println!("{} — {}", game, format_week(state.total_weeks));
    println!("Balance:    {}", format_cents(state.balance));
    println!("Employees:  {}", state.employee_count);
    println!(
        "Inventory:  {} {} worth {}",
        state.inventory.len(),
        plural("item", state.inventory.len() as i64),
        format_cents(state.inventory.total_value()?)
    );
    println!(
        "Menu:       {} {}",
        state.dishes.len(),
        if state.dishes.len() == 1 { "dish" } else { "dishes" }
    );
    println!(
        "Loans:      {} active, {} on offer",
        state.loans.len(),
        state.loan_offers.len()
    );
    println!(
        "Per month:  {} revenue, {} expenses",
        format_cents(metrics.monthly_revenue),
        format_cents(metrics.monthly_expense)
    );
    Ok(())
}

fn print_inventory(state: &GameState) -> Result<()> {
    if state.inventory.is_empty() {
        println!("Nothing in stock.");
        return Ok(());
    }
    for item in state.inventory.iter() {
        println!("{} (worth {})", item, format_cents(item.value()?));
    }
    println!("Total value: {}", format_cents(state.inventory.total_value()?));
    Ok(())
}

fn print_dish(state: &GameState, dish: &Dish) -> Result<()> {
    println!("{} — {}", dish.name, format_cents(dish.price));
    println!(
        "Cost per serving: {}",
        format_cents(cost_of_dish(dish, &state.inventory, 1, true)?)
    );
    println!("Servings in stock: {}", servings_available(dish, &state.inventory)?);
    println!("Ingredients:");
    for ingredient in &dish.ingredients {
        println!("  {}", ingredient);
    }
    Ok(())
}

fn print_week(week: i64, result: &TransitionResult) {
    println!("{}:", format_week(week));
    for line in dish_lines(result) {
        println!("  {}", line);
    }
    println!("  Revenue:       {}", format_cents(result.revenue));
    println!("  Ingredients:   {}", format_cents(result.cost_of_goods));
    println!("  Payroll:       {}", format_cents(result.payroll));
    if result.repayments > 0 {
        println!("  Loan payments: {}", format_cents(result.repayments));
    }
    for name in &result.loans_settled {
        println!("  Paid off {}!", name);
    }
}

/// One line per dish ordered this week, including dishes nobody could be served.
fn dish_lines(result: &TransitionResult) -> Vec<String> {
    let dishes: BTreeSet<&String> = result.served.keys().chain(result.missed.keys()).collect();
    dishes
        .into_iter()
        .map(|dish| {
            let served = result.served.get(dish).copied().unwrap_or(0);
            match result.missed.get(dish).copied().unwrap_or(0) {
                0 => format!("{}: served {}", dish, served),
                missed => format!("{}: served {}, turned away {}", dish, served, missed),
            }
        })
        .collect()
}

fn print_loans(state: &GameState) -> Result<()> {
    if state.loans.is_empty() {
        println!("No active loans.");
    } else {
        println!("Active loans:");
        for (i, loan) in state.loans.values().enumerate() {
            println!(
                "{}: {} — {} left, {} {} to go",
                i + 1,
                loan.name,
                format_cents(loan.outstanding),
                loan.remaining_payments(),
                plural("payment", loan.remaining_payments())
            );
        }
    }

    if state.loan_offers.is_empty() {
        println!("No offers. Try `loans refresh`.");
        return Ok(());
    }
    let metrics = state.metrics();
    println!("Offers:");
    for (i, offer) in state.loan_offers.values().enumerate() {
        let mark = if offer.check(&metrics) { "" } else { " (not eligible)" };
        println!("{}: {}{}", i + 1, summarize_loan(offer), mark);
    }
    Ok(())
}

fn summarize_loan(loan: &Loan) -> String {
    if loan.is_subsidy() {
        format!("{} — {} grant", loan.name, format_cents(loan.amount))
    } else {
        format!(
            "{} — {} over {} {} at {} {}, paid {}",
            loan.name,
            format_cents(loan.amount),
            loan.term_years,
            plural("year", loan.term_years),
            format_rate(loan.rate),
            loan.interest,
            loan.payback
        )
    }
}

fn print_loan_details(state: &GameState, loan: &Loan) -> Result<()> {
    println!("{}", summarize_loan(loan));
    if !loan.is_subsidy() {
        println!("Total due:       {}", format_cents(loan.total_due()?));
        println!(
            "Payments:        {} of {}",
            loan.payment_count(),
            format_cents(loan.normal_payment()?)
        );
        if state.loans.contains_key(&loan.name) {
            println!("Outstanding:     {}", format_cents(loan.outstanding));
            println!("Next payment:    {}", format_cents(loan.next_payment()?));
        }
    }
    if !loan.requirements.is_empty() {
        let metrics = state.metrics();
        println!("Requirements:");
        for req in &loan.requirements {
            let mark = if req.check(&metrics) { "met" } else { "not met" };
            println!("  {} ({})", req, mark);
        }
    }
    Ok(())
}

fn print_verify(report: &VerifyReport) {
    println!("Events:   {}", report.events);
    println!("Hash:     {}", report.hash);
    println!(
        "Session:  {}",
        if report.matches_session { "matches replay" } else { "DIFFERS from replay" }
    );
    match &report.snapshot {
        None => println!("Snapshot: none"),
        Some(check) => {
            let status = match (check.intact, check.matches_log) {
                (false, _) => "corrupt",
                (true, false) => "disagrees with the event log",
                (true, true) => "matches the event log",
            };
            println!("Snapshot: #{} {}", check.sequence, status);
            if let Some(drift) = check.drift.as_ref().filter(|d| !d.is_empty()) {
                println!("Since the snapshot:");
                print!("{}", drift);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["spaghetto", "step", "4", "--game", "luigi", "-vv"]).unwrap();
        assert_eq!(cli.game, "luigi");
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Command::Step { weeks: 4 }));
    }

    #[test]
    fn shell_line_reuses_commands() {
        let words = split_words("dish add \"Cacio e Pepe\" 14.50 -i Spaghetti=120").unwrap();
        let parsed = ShellLine::try_parse_from(&words).unwrap();
        match parsed.command {
            Command::Dish {
                action: DishAction::Add { name, ingredients, .. },
            } => {
                assert_eq!(name, "Cacio e Pepe");
                assert_eq!(ingredients, vec!["Spaghetti=120".to_string()]);
            }
            _ => panic!("expected dish add"),
        }
    }

    #[test]
    fn split_words_handles_quotes() {
        assert_eq!(split_words("  a 'b c'  \"\" ").unwrap(), vec!["a", "b c", ""]);
        assert!(split_words("buy \"Flour").is_err());
    }

    fn stocked() -> GameState {
        let mut state = GameState::default();
        state
            .inventory
            .add(&Item {
                name: "Spaghetti".into(),
                quantity: 1_000,
                unit: "gram".into(),
                price: 500,
            })
            .unwrap();
        state
    }

    #[test]
    fn ingredient_unit_comes_from_stock() {
        let state = stocked();
        let ing = parse_ingredient(&state, "spag=120").unwrap();
        assert_eq!(ing.name, "Spaghetti");
        assert_eq!(ing.unit, "gram");
        assert_eq!(ing.quantity, 120);

        let ing = parse_ingredient(&state, "Egg=2:egg").unwrap();
        assert_eq!(ing.unit, "egg");
        assert!(parse_ingredient(&state, "Egg=2").is_err());
        assert!(parse_ingredient(&state, "Egg").is_err());
    }

    #[test]
    fn interactive_ingredients() {
        let state = stocked();
        let input = "Spaghetti\n120\nPecorino\ngram\n30\n\n";
        let mut prompter = Prompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new());
        let list = ask_ingredients(&state, &mut prompter).unwrap().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].name, "Pecorino");
        assert_eq!(list[1].quantity, 30);

        let mut prompter = Prompter::new(Cursor::new(b"\n".to_vec()), Vec::new());
        assert!(ask_ingredients(&state, &mut prompter).unwrap().is_none());
    }

    #[test]
    fn shell_runs_commands_until_back() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.simulation.seed = Some(1);
        let mut session = Session::open(tmp.path(), "shell", &config).unwrap();

        let input = "hire 2\nbogus\nfire 5\nback\nhire 1\n";
        let mut prompter = Prompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new());
        shell_loop(&mut session, &mut prompter).unwrap();
        // the failed fire and the line after `back` change nothing
        assert_eq!(session.state().employee_count, 2);
    }

    fn fresh_session(dir: &Path) -> Session {
        let mut config = AppConfig::default();
        config.simulation.seed = Some(1);
        Session::open(dir, "trattoria", &config).unwrap()
    }

    fn buy(name: &str, quantity: i64) -> Command {
        Command::Buy {
            name: name.into(),
            quantity,
            unit: "cup".into(),
            price: "5".into(),
        }
    }

    #[test]
    fn buying_a_new_name_never_tops_up_a_similar_item() {
        let tmp = tempfile::tempdir().unwrap();
        let mut session = fresh_session(tmp.path());
        let mut prompter = Prompter::new(Cursor::new(Vec::new()), Vec::new());

        execute(&mut session, buy("Green Tea", 10), &mut prompter).unwrap();
        execute(&mut session, buy("Tea", 3), &mut prompter).unwrap();

        let inventory = &session.state().inventory;
        let names: Vec<&str> = inventory.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Green Tea", "Tea"]);
        assert_eq!(inventory.get("Green Tea").unwrap().quantity().unwrap(), 10);
        assert_eq!(inventory.get("Tea").unwrap().quantity().unwrap(), 3);
    }

    #[test]
    fn discard_resolves_stocked_items_only() {
        let tmp = tempfile::tempdir().unwrap();
        let mut session = fresh_session(tmp.path());
        let mut prompter = Prompter::new(Cursor::new(Vec::new()), Vec::new());
        execute(&mut session, buy("Green Tea", 10), &mut prompter).unwrap();

        let discard = |name: &str| Command::Discard {
            name: name.into(),
            quantity: 4,
        };
        execute(&mut session, discard("green"), &mut prompter).unwrap();
        assert_eq!(
            session.state().inventory.get("Green Tea").unwrap().quantity().unwrap(),
            6
        );

        let before = session.current_sequence();
        let err = execute(&mut session, discard("Coffee"), &mut prompter).unwrap_err();
        assert!(err.to_string().contains("No such item"));
        assert_eq!(session.current_sequence(), before);
    }

    #[test]
    fn dish_price_is_asked_when_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut session = fresh_session(tmp.path());
        session
            .buy_item(Item {
                name: "Spaghetti".into(),
                quantity: 1_000,
                unit: "gram".into(),
                price: 500,
            })
            .unwrap();

        let input = "cheap\n-1\n12.50\nSpaghetti\n120\n\n";
        let mut prompter = Prompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new());
        let add = Command::Dish {
            action: DishAction::Add {
                name: "Aglio e Olio".into(),
                price: None,
                ingredients: vec![],
            },
        };
        execute(&mut session, add, &mut prompter).unwrap();
        assert_eq!(session.state().dishes.get("Aglio e Olio").unwrap().price, 1_250);

        let mut prompter = Prompter::new(Cursor::new(Vec::new()), Vec::new());
        let add = Command::Dish {
            action: DishAction::Add {
                name: "Carbonara".into(),
                price: None,
                ingredients: vec![],
            },
        };
        execute(&mut session, add, &mut prompter).unwrap();
        assert!(session.state().dishes.get("Carbonara").is_none());
    }

    #[test]
    fn week_report_lists_dishes_nobody_was_served() {
        let mut result = TransitionResult::default();
        result.served.insert("Lasagna".into(), 12);
        result.missed.insert("Lasagna".into(), 3);
        result.missed.insert("Ravioli".into(), 8);
        assert_eq!(
            dish_lines(&result),
            vec![
                "Lasagna: served 12, turned away 3".to_string(),
                "Ravioli: served 0, turned away 8".to_string(),
            ]
        );
    }

    #[test]
    fn loans_found_by_number_or_name() {
        let offers = [
            Loan::new(
                "Piazza Bank",
                1,
                100_000,
                500,
                spaghetto_engine::loans::InterestKind::Simple,
                spaghetto_engine::loans::PaybackSchedule::Monthly,
                vec![],
            )
            .unwrap(),
            Loan::new(
                "Harbor Trust",
                2,
                200_000,
                500,
                spaghetto_engine::loans::InterestKind::Simple,
                spaghetto_engine::loans::PaybackSchedule::Monthly,
                vec![],
            )
            .unwrap(),
        ];
        assert_eq!(find_loan(offers.iter(), "2").unwrap().name, "Harbor Trust");
        assert_eq!(find_loan(offers.iter(), "piazza").unwrap().name, "Piazza Bank");
        assert!(find_loan(offers.iter(), "0").is_none());
        assert!(find_loan(offers.iter(), "Vesuvio").is_none());
    }
}
