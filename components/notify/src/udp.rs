use crate::wire::encode_message;
use crate::{Message, Notifier, NotifyError, Options};
use async_trait::async_trait;
use tokio::net::UdpSocket;

/// Notifier writing each accepted message as one datagram to a pre-dialed
/// UDP endpoint.
pub struct UdpNotifier {
    socket: UdpSocket,
    options: Options,
}

impl UdpNotifier {
    pub async fn dial(addr: &str, options: Options) -> Result<Self, NotifyError> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(addr).await?;
        Ok(Self { socket, options })
    }
}

#[async_trait]
impl Notifier for UdpNotifier {
    fn accept(&self, msg: &Message) -> bool {
        self.options.accept(msg)
    }

    async fn notify(&self, msg: &Message) -> Result<(), NotifyError> {
        let buf = encode_message(msg);
        self.socket.send(&buf).await?;
        Ok(())
    }
}
