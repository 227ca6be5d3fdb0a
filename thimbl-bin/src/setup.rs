use thimbl_lib::{Address, Error, Identity};

/// Ask for the details of a new local identity
pub fn prompt_identity() -> Result<Identity, Error> {
    let address = loop {
        let address = rprompt::prompt_reply("Address (e.g. dk@telekommunisten.org): ")?;
        let address = address.trim().to_owned();
        match address.parse::<Address>() {
            Ok(_) => break address,
            Err(e) => println!("{}", e.kind),
        }
    };

    let bio = rprompt::prompt_reply("Bio: ")?;
    let name = rprompt::prompt_reply("Name: ")?;
    let website = rprompt::prompt_reply("Website: ")?;
    let mobile = rprompt::prompt_reply("Mobile: ")?;
    let email = rprompt::prompt_reply("Email: ")?;

    Ok(Identity {
        address,
        name,
        bio,
        website,
        mobile,
        email,
    })
}
