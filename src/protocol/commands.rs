use std::fmt::{self, Display};

/// How the text following a command name is handed to its handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgPolicy {
    /// Whitespace-delimited arguments.
    Split,
    /// Everything after the first whitespace, verbatim.
    Raw,
}

/// Commands may carry at most this many whitespace-delimited tokens,
/// including the command name itself.
pub const MAX_ARGS: usize = 64;

macro_rules! commands {
    ($($name:literal => $kind:ident($policy:ident),)*) => {
        /// Every command the target understands.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum CommandKind {
            $($kind,)*
        }

        impl CommandKind {
            /// All commands, in registry order.
            pub const ALL: &'static [CommandKind] = &[$(CommandKind::$kind,)*];

            /// Name of the command on the wire.
            pub fn name(self) -> &'static str {
                match self {
                    $(CommandKind::$kind => $name,)*
                }
            }

            pub fn policy(self) -> ArgPolicy {
                match self {
                    $(CommandKind::$kind => ArgPolicy::$policy,)*
                }
            }

            /// Case-sensitive lookup by name.
            pub fn from_name(name: &str) -> Option<CommandKind> {
                match name {
                    $($name => Some(CommandKind::$kind),)*
                    _ => None,
                }
            }
        }
    };
}

commands! {
    "status" => Status(Split),
    "break" => Break(Split),
    "step" => Step(Split),
    "run" => Run(Split),
    "regs" => Regs(Split),
    "mem" => Mem(Split),
    "memset" => MemSet(Split),
    "bp" => Bp(Raw),
    "bplist" => BpList(Split),
    "bpdel" => BpDel(Split),
    "symlist" => SymList(Split),
    "exmask" => ExMask(Split),
    "console" => Console(Raw),
    "infoym" => InfoYm(Raw),
    "profile" => Profile(Split),
    "resetwarm" => ResetWarm(Split),
    "resetcold" => ResetCold(Split),
    "ffwd" => Ffwd(Split),
    "memfind" => MemFind(Split),
}

impl Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Arguments following the command name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Args<'a> {
    Split(Vec<&'a str>),
    Raw(&'a str),
}

impl<'a> Args<'a> {
    /// The split arguments. Raw arguments are presented as a single
    /// argument.
    pub fn as_split(&self) -> &[&'a str] {
        match self {
            Args::Split(args) => args,
            Args::Raw(raw) => core::slice::from_ref(raw),
        }
    }

    /// The raw argument string. Split arguments yield the first argument, or
    /// an empty string.
    pub fn as_raw(&self) -> &'a str {
        match self {
            Args::Split(args) => args.first().copied().unwrap_or(""),
            Args::Raw(raw) => raw,
        }
    }
}

/// A command line, split according to its command's [`ArgPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand<'a> {
    pub kind: CommandKind,
    pub args: Args<'a>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandParseError<'a> {
    NotUtf8,
    Empty,
    /// The first token doesn't name a registered command.
    Unknown(&'a str),
    TooManyArgs,
}

impl Display for CommandParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::CommandParseError::*;
        match self {
            NotUtf8 => write!(f, "command is not valid UTF-8"),
            Empty => write!(f, "empty command"),
            Unknown(name) => write!(f, "unknown command `{}`", name),
            TooManyArgs => write!(f, "too many arguments"),
        }
    }
}

fn is_delim(c: char) -> bool {
    c == ' ' || c == '\t'
}

impl<'a> ParsedCommand<'a> {
    /// Parse one command line (without its terminator).
    pub fn parse(line: &'a [u8]) -> Result<ParsedCommand<'a>, CommandParseError<'a>> {
        let line = core::str::from_utf8(line).map_err(|_| CommandParseError::NotUtf8)?;

        let mut tokens = line.split(is_delim).filter(|s| !s.is_empty());
        let name = tokens.next().ok_or(CommandParseError::Empty)?;
        let kind = CommandKind::from_name(name).ok_or(CommandParseError::Unknown(name))?;

        let args = match kind.policy() {
            ArgPolicy::Split => {
                let args: Vec<&str> = tokens.take(MAX_ARGS).collect();
                if args.len() + 1 >= MAX_ARGS {
                    return Err(CommandParseError::TooManyArgs);
                }
                Args::Split(args)
            }
            ArgPolicy::Raw => {
                // skip to just past the delimiter which follows the name
                let name_end = line.find(name).map(|i| i + name.len()).unwrap_or(0);
                let rest = &line[name_end..];
                Args::Raw(match rest.chars().next() {
                    Some(c) => &rest[c.len_utf8()..],
                    None => "",
                })
            }
        };

        Ok(ParsedCommand { kind, args })
    }
}
