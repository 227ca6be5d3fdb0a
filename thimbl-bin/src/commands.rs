use std::env;
use std::io::Read;
use thimbl_lib::{
    fetch_plan, Address, Error, ErrorKind, FingerClient, Follow, Profile, Session, Settings,
};
use tokio::runtime::Runtime;

#[derive(Debug, Clone)]
pub struct Command {
    cmd: &'static str,
    usage_params: &'static str,
    desc: &'static str,
}

impl Command {
    fn usage<T>(&self, msg: String) -> Result<T, Error> {
        Err(ErrorKind::Usage(
            msg,
            format!("thimbl {} {}", self.cmd, self.usage_params),
        )
        .into())
    }
}

const COMMANDS: [Command; 14] = [
    Command {
        cmd: "catfollows",
        usage_params: "<address>",
        desc: "finger someone and list who they follow",
    },
    Command {
        cmd: "fetch",
        usage_params: "",
        desc: "finger everyone you follow and cache their plans",
    },
    Command {
        cmd: "finger",
        usage_params: "<user@host[@host...]>",
        desc: "finger an address and print the raw response",
    },
    Command {
        cmd: "follow",
        usage_params: "<nick> <address>",
        desc: "start following the given address",
    },
    Command {
        cmd: "following",
        usage_params: "",
        desc: "list who you follow",
    },
    Command {
        cmd: "help",
        usage_params: "<command>",
        desc: "show this list",
    },
    Command {
        cmd: "post",
        usage_params: "[text]",
        desc: "post a message (prompts for it if not given)",
    },
    Command {
        cmd: "print",
        usage_params: "",
        desc: "print all cached messages, oldest first",
    },
    Command {
        cmd: "read",
        usage_params: "",
        desc: "fetch, then print",
    },
    Command {
        cmd: "setup",
        usage_params: "",
        desc: "set up your identity (replaces any existing cache)",
    },
    Command {
        cmd: "stdin",
        usage_params: "",
        desc: "post a message read from standard input",
    },
    Command {
        cmd: "unfollow",
        usage_params: "<address>",
        desc: "stop following the given address",
    },
    Command {
        cmd: "whois",
        usage_params: "<address>",
        desc: "finger someone and show their profile",
    },
    Command {
        cmd: "version",
        usage_params: "",
        desc: "print the version",
    },
];

/// What every command may need
struct Context<'a> {
    profile: Profile,
    settings: Settings,
    client: FingerClient,
    rt: &'a Runtime,
}

impl Context<'_> {
    /// Run `f` against the local session, running setup first if there is
    /// no cache yet. The session is closed (saved and published) afterwards.
    fn with_session<F>(&self, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Session, &Context<'_>) -> Result<(), Error>,
    {
        let mut session = match Session::open(self.profile.clone(), self.settings.clone())? {
            Some(session) => session,
            None => {
                println!("No thimbl data found, running setup.");
                let identity = crate::setup::prompt_identity()?;
                Session::create(self.profile.clone(), self.settings.clone(), identity)?
            }
        };
        f(&mut session, self)?;
        session.close()
    }
}

pub fn handle_command(mut args: env::Args, rt: &Runtime) -> Result<(), Error> {
    let command_string = match args.next() {
        Some(s) => s,
        None => return Err(ErrorKind::UnknownCommand(String::new()).into()),
    };

    let command = find_command(&command_string)?;

    let profile = Profile::new()?;
    let settings = Settings::load(&profile)?;
    let ctx = Context {
        client: FingerClient::new(&settings),
        profile,
        settings,
        rt,
    };

    match command.cmd {
        "catfollows" => catfollows(command, args, &ctx)?,
        "fetch" => ctx.with_session(|s, ctx| fetch(s, ctx))?,
        "finger" => finger(command, args, &ctx)?,
        "follow" => follow(command, args, &ctx)?,
        "following" => ctx.with_session(|s, _| following(s))?,
        "help" => help(command, args)?,
        "post" => post(command, args, &ctx)?,
        "print" => ctx.with_session(|s, _| print(s))?,
        "read" => ctx.with_session(|s, ctx| {
            fetch(s, ctx)?;
            print(s)
        })?,
        "setup" => setup(&ctx)?,
        "stdin" => stdin(&ctx)?,
        "unfollow" => unfollow(command, args, &ctx)?,
        "whois" => whois(command, args, &ctx)?,
        "version" => println!("thimbl {}", env!("CARGO_PKG_VERSION")),
        _ => unreachable!("{} is in the command table", command.cmd),
    }

    Ok(())
}

fn find_command(name: &str) -> Result<Command, Error> {
    match COMMANDS.iter().find(|c| c.cmd == name) {
        Some(c) => Ok(c.to_owned()),
        None => Err(ErrorKind::UnknownCommand(name.to_owned()).into()),
    }
}

pub fn help(_cmd: Command, mut args: env::Args) -> Result<(), Error> {
    if let Some(sub) = args.next() {
        for c in COMMANDS.iter() {
            if sub == c.cmd {
                println!("thimbl {} {}", c.cmd, c.usage_params);
                println!("    {}", c.desc);
                return Ok(());
            }
        }
        println!("No such command {}", sub);
    } else {
        for c in COMMANDS.iter() {
            println!("  {} {}", c.cmd, c.usage_params);
        }
    }
    Ok(())
}

// Parse an address argument, rejecting it before anything is touched
fn address_arg(cmd: &Command, arg: Option<String>) -> Result<String, Error> {
    let address = match arg {
        Some(a) => a,
        None => return cmd.usage("Missing address parameter".to_string()),
    };
    let _: Address = address.parse()?;
    Ok(address)
}

fn catfollows(cmd: Command, mut args: env::Args, ctx: &Context<'_>) -> Result<(), Error> {
    let address = address_arg(&cmd, args.next())?;

    // The session isn't needed, but opening it republishes our plan
    ctx.with_session(|_, ctx| {
        let plan = ctx.rt.block_on(fetch_plan(
            &ctx.client,
            &address,
            ctx.settings.max_plan_bytes,
        ))?;

        println!("{} follows (nick / address):", plan.name);
        for follow in plan.following.iter() {
            let nick = follow.display_nick().unwrap_or("No nick");
            println!("{:-<20} {}", nick, follow.address);
        }
        Ok(())
    })
}

fn fetch(session: &mut Session, ctx: &Context<'_>) -> Result<(), Error> {
    let report = ctx.rt.block_on(session.fetch(&ctx.client))?;
    for (address, e) in report.skipped.iter() {
        println!("Failed to fetch {}, skipping: {}", address, e.kind);
    }
    if report.self_skips > 0 {
        println!("Stop fingering yourself!");
    }
    println!(
        "Finished: {} fetched, {} skipped",
        report.fetched.len(),
        report.skipped.len()
    );
    Ok(())
}

fn finger(cmd: Command, mut args: env::Args, ctx: &Context<'_>) -> Result<(), Error> {
    let query = match args.next() {
        Some(q) => q,
        None => return cmd.usage("Missing address parameter".to_string()),
    };

    ctx.with_session(|_, ctx| {
        for address in Address::expand_hosts(&query) {
            match ctx.rt.block_on(ctx.client.finger(&address)) {
                Ok(response) => println!("{}", response),
                Err(e) => println!("Could not finger {}: {}", address, e.kind),
            }
        }
        Ok(())
    })
}

fn follow(cmd: Command, mut args: env::Args, ctx: &Context<'_>) -> Result<(), Error> {
    let nick = match args.next() {
        Some(n) => n,
        None => return cmd.usage("Missing nick parameter".to_string()),
    };
    let address = address_arg(&cmd, args.next())?;

    ctx.with_session(|session, _| session.follow(&nick, &address))
}

fn following(session: &mut Session) -> Result<(), Error> {
    let mut followees: Vec<&Follow> = session.cache().local_plan().following.iter().collect();
    followees.sort_by(|a, b| a.nick.cmp(&b.nick));
    for f in followees {
        println!("{:5} {}", f.nick.as_deref().unwrap_or(""), f.address);
    }
    Ok(())
}

fn post(_cmd: Command, args: env::Args, ctx: &Context<'_>) -> Result<(), Error> {
    let words: Vec<String> = args.collect();
    let text = if words.is_empty() {
        rprompt::prompt_reply("Type your message and press return:\n> ")?
    } else {
        words.join(" ")
    };

    ctx.with_session(|session, _| session.post(text))
}

fn print(session: &mut Session) -> Result<(), Error> {
    for entry in session.cache().timeline() {
        println!("{}", entry);
    }
    Ok(())
}

fn setup(ctx: &Context<'_>) -> Result<(), Error> {
    let identity = crate::setup::prompt_identity()?;
    let session = Session::create(ctx.profile.clone(), ctx.settings.clone(), identity)?;
    println!("Set up as {}", session.cache().me());
    session.close()
}

fn stdin(ctx: &Context<'_>) -> Result<(), Error> {
    let mut text = String::new();
    std::io::stdin().read_to_string(&mut text)?;
    ctx.with_session(|session, _| session.post(text))
}

fn unfollow(cmd: Command, mut args: env::Args, ctx: &Context<'_>) -> Result<(), Error> {
    let address = match args.next() {
        Some(a) => a,
        None => return cmd.usage("Missing address parameter".to_string()),
    };

    ctx.with_session(|session, _| {
        let removed = session.unfollow(&address)?;
        if removed == 0 {
            println!("You were not following {}", address);
        }
        Ok(())
    })
}

fn whois(cmd: Command, mut args: env::Args, ctx: &Context<'_>) -> Result<(), Error> {
    let address = address_arg(&cmd, args.next())?;

    ctx.with_session(|_, ctx| {
        let plan = ctx.rt.block_on(fetch_plan(
            &ctx.client,
            &address,
            ctx.settings.max_plan_bytes,
        ))?;

        println!("User Name: {} (address: {})", plan.name, plan.address);
        println!("Biography: {}", plan.bio);
        println!("Contact:");
        println!(" - Email: {}", plan.property("email"));
        println!(" - web: {}", plan.property("website"));
        println!(" - mobile: {}", plan.property("mobile"));
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_command() {
        for c in COMMANDS.iter() {
            assert_eq!(find_command(c.cmd).unwrap().cmd, c.cmd);
        }
        let e = find_command("frobnicate").unwrap_err();
        assert!(matches!(e.kind, ErrorKind::UnknownCommand(ref s) if s == "frobnicate"));
    }
}
