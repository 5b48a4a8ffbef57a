/// SOCKS5 commands the client may issue. `BIND` is not represented: this
/// crate only drives `CONNECT` and `UDP ASSOCIATE` exchanges.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Command {
    Connect,
    Associate,
}

impl Command {
    const CONNECT: u8 = 0x01;
    const ASSOCIATE: u8 = 0x03;
}

impl TryFrom<u8> for Command {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            Self::CONNECT => Ok(Self::Connect),
            Self::ASSOCIATE => Ok(Self::Associate),
            code => Err(code),
        }
    }
}

impl From<Command> for u8 {
    fn from(cmd: Command) -> Self {
        match cmd {
            Command::Connect => Command::CONNECT,
            Command::Associate => Command::ASSOCIATE,
        }
    }
}
