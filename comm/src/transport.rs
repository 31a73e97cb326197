/*++

Licensed under the Apache-2.0 license.

File Name:

    transport.rs

Abstract:

    File contains the message transport that orchestrates framing, IV
    sequencing and crypto for inter-die send/receive, and the crypto
    strategies selected at construction time.

--*/

use crate::channel::{message_kind, ChannelTable, MessageKind, PeerChannel, MAX_PEERS, SLAVE_CHANNEL_INDEX};
use crate::cprintln;
use crate::crypto_op::{self, AesOpParams};
use crate::frame::{
    self, CmdHeader, IvPolicy, MessageClass, HEADER_LEN_BYTES, IV1_OFFSET_IN_FRAME_BYTES,
    MSG_BUF_CAPACITY_BYTES, RESP_SIZE_WORDS, TAG_SIZE_BYTES,
};
use crate::iface::{BufferAddressResolver, CryptoEngine, SharedBufferMem};
use crate::nonce::IV_SIZE_BYTES;
use crate::printer::HexWord;
use ssit_error::{SsitError, SsitResult};
use zerocopy::IntoBytes;

/// Role of this die in the package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DieRole {
    Master,
    Slave,
}

fn check_peer(peer: usize) -> SsitResult<u32> {
    match peer {
        1..=MAX_PEERS => Ok(peer as u32 - 1),
        _ => Err(SsitError::TRANSPORT_INVALID_PEER),
    }
}

/// Buffer map as seen from the master die: it sends into each peer's
/// message buffer and reads responses from each peer's response buffer.
#[derive(Debug, Clone)]
pub struct MasterBufferMap {
    msg_buf_base: u32,
    resp_buf_base: u32,
    stride: u32,
}

impl MasterBufferMap {
    pub fn new(msg_buf_base: u32, resp_buf_base: u32, stride: u32) -> MasterBufferMap {
        MasterBufferMap {
            msg_buf_base,
            resp_buf_base,
            stride,
        }
    }
}

impl BufferAddressResolver for MasterBufferMap {
    fn send_addr(&self, peer: usize) -> SsitResult<u32> {
        Ok(self.msg_buf_base + check_peer(peer)? * self.stride)
    }

    fn recv_addr(&self, peer: usize) -> SsitResult<u32> {
        Ok(self.resp_buf_base + check_peer(peer)? * self.stride)
    }
}

/// Buffer map as seen from a slave die: it reads commands from its own
/// message buffer and sends responses into its own response buffer.
#[derive(Debug, Clone)]
pub struct SlaveBufferMap {
    msg_buf_base: u32,
    resp_buf_base: u32,
    stride: u32,
}

impl SlaveBufferMap {
    pub fn new(msg_buf_base: u32, resp_buf_base: u32, stride: u32) -> SlaveBufferMap {
        SlaveBufferMap {
            msg_buf_base,
            resp_buf_base,
            stride,
        }
    }
}

impl BufferAddressResolver for SlaveBufferMap {
    fn send_addr(&self, peer: usize) -> SsitResult<u32> {
        Ok(self.resp_buf_base + check_peer(peer)? * self.stride)
    }

    fn recv_addr(&self, peer: usize) -> SsitResult<u32> {
        Ok(self.msg_buf_base + check_peer(peer)? * self.stride)
    }
}

/// Per-message crypto policy, selected once at transport construction.
pub trait ChannelCryptoStrategy {
    fn send(
        &mut self,
        channel: &mut PeerChannel,
        class: MessageClass,
        is_cfg_cmd: bool,
        buf: &[u32],
        mem: &mut dyn SharedBufferMem,
        addr: u32,
    ) -> SsitResult<()>;

    fn receive(
        &mut self,
        channel: &mut PeerChannel,
        class: MessageClass,
        is_cfg_cmd: bool,
        buf: &mut [u32],
        mem: &mut dyn SharedBufferMem,
        addr: u32,
    ) -> SsitResult<()>;
}

/// Copy-through strategy for builds without secure inter-die communication.
/// Never touches IVs or keys.
#[derive(Debug, Default)]
pub struct PlainCopyStrategy;

impl ChannelCryptoStrategy for PlainCopyStrategy {
    fn send(
        &mut self,
        _channel: &mut PeerChannel,
        _class: MessageClass,
        _is_cfg_cmd: bool,
        buf: &[u32],
        mem: &mut dyn SharedBufferMem,
        addr: u32,
    ) -> SsitResult<()> {
        mem.write(addr, buf.as_bytes())
            .map_err(|_| SsitError::TRANSPORT_COPY_TO_BUFFER_FAILURE)
    }

    fn receive(
        &mut self,
        _channel: &mut PeerChannel,
        _class: MessageClass,
        _is_cfg_cmd: bool,
        buf: &mut [u32],
        mem: &mut dyn SharedBufferMem,
        addr: u32,
    ) -> SsitResult<()> {
        mem.read(addr, buf.as_mut_bytes())
            .map_err(|_| SsitError::TRANSPORT_COPY_FROM_BUFFER_FAILURE)
    }
}

/// Authenticated-encryption strategy: frames each message per the channel
/// state and drives the AES-GCM engine.
pub struct AuthenticatedEncryptStrategy<E: CryptoEngine> {
    engine: E,
}

impl<E: CryptoEngine> AuthenticatedEncryptStrategy<E> {
    pub fn new(engine: E) -> AuthenticatedEncryptStrategy<E> {
        AuthenticatedEncryptStrategy { engine }
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }
}

impl<E: CryptoEngine> ChannelCryptoStrategy for AuthenticatedEncryptStrategy<E> {
    fn send(
        &mut self,
        channel: &mut PeerChannel,
        class: MessageClass,
        is_cfg_cmd: bool,
        buf: &[u32],
        mem: &mut dyn SharedBufferMem,
        addr: u32,
    ) -> SsitResult<()> {
        let kind = message_kind(channel.state(), is_cfg_cmd);
        if kind == MessageKind::Plain {
            return mem
                .write(addr, buf.as_bytes())
                .map_err(|_| SsitError::TRANSPORT_COPY_TO_BUFFER_FAILURE);
        }

        let header = CmdHeader(*buf.first().ok_or(SsitError::FRAME_INVALID_LENGTH)?);
        let layout = frame::encrypt_layout(class, kind, is_cfg_cmd, header)?;
        let src = buf.as_bytes();
        let aad = src
            .get(layout.aad.clone())
            .ok_or(SsitError::FRAME_INVALID_LENGTH)?;
        let input = src
            .get(layout.local_offset..layout.local_offset + layout.data.len())
            .ok_or(SsitError::FRAME_INVALID_LENGTH)?;

        let iv = match layout.iv_policy {
            IvPolicy::UseCurrent => *channel.iv(),
            IvPolicy::Advance(step) => channel.advance_iv(step),
            IvPolicy::Lookahead(step) => channel.lookahead_iv(step),
            IvPolicy::AdoptFromFrame => return Err(SsitError::FRAME_INVALID_LENGTH),
        };

        let mut frame_buf = [0u8; MSG_BUF_CAPACITY_BYTES];
        frame_buf[layout.aad.clone()].copy_from_slice(aad);

        let mut tag = [0u8; TAG_SIZE_BYTES];
        crypto_op::encrypt(
            &mut self.engine,
            AesOpParams {
                key_slot: channel.key_slot(),
                iv: &iv,
                aad,
                input,
                output: &mut frame_buf[layout.data.clone()],
            },
            &mut tag,
        )?;
        frame_buf[layout.tag.clone()].copy_from_slice(&tag);

        mem.write(addr, &frame_buf[..layout.frame_len()])
            .map_err(|_| SsitError::TRANSPORT_COPY_TO_BUFFER_FAILURE)
    }

    fn receive(
        &mut self,
        channel: &mut PeerChannel,
        class: MessageClass,
        is_cfg_cmd: bool,
        buf: &mut [u32],
        mem: &mut dyn SharedBufferMem,
        addr: u32,
    ) -> SsitResult<()> {
        let kind = message_kind(channel.state(), is_cfg_cmd);
        if kind == MessageKind::Plain {
            return mem
                .read(addr, buf.as_mut_bytes())
                .map_err(|_| SsitError::TRANSPORT_COPY_FROM_BUFFER_FAILURE);
        }

        let mut header_bytes = [0u8; HEADER_LEN_BYTES];
        mem.read(addr, &mut header_bytes)
            .map_err(|_| SsitError::TRANSPORT_COPY_FROM_BUFFER_FAILURE)?;
        let header = CmdHeader(u32::from_le_bytes(header_bytes));
        let layout = frame::decrypt_layout(class, kind, is_cfg_cmd, header)?;

        let mut frame_buf = [0u8; MSG_BUF_CAPACITY_BYTES];
        mem.read(addr, &mut frame_buf[..layout.frame_len()])
            .map_err(|_| SsitError::TRANSPORT_COPY_FROM_BUFFER_FAILURE)?;

        let iv = match layout.iv_policy {
            IvPolicy::AdoptFromFrame => {
                let mut iv1 = [0u8; IV_SIZE_BYTES];
                iv1.copy_from_slice(
                    &frame_buf
                        [IV1_OFFSET_IN_FRAME_BYTES..IV1_OFFSET_IN_FRAME_BYTES + IV_SIZE_BYTES],
                );
                channel.set_iv(&iv1);
                iv1
            }
            IvPolicy::Lookahead(step) => channel.lookahead_iv(step),
            IvPolicy::Advance(step) => channel.advance_iv(step),
            IvPolicy::UseCurrent => *channel.iv(),
        };

        let mut tag = [0u8; TAG_SIZE_BYTES];
        tag.copy_from_slice(&frame_buf[layout.tag.clone()]);

        match class {
            MessageClass::Request => {
                let dst = buf.as_mut_bytes();
                let data_end = layout.local_offset + layout.data.len();
                if dst.len() < data_end || dst.len() < layout.aad.len() {
                    return Err(SsitError::FRAME_INVALID_LENGTH);
                }
                // The AAD region travels in the clear but is delivered to
                // the caller along with the decrypted payload.
                dst[layout.aad.clone()].copy_from_slice(&frame_buf[layout.aad.clone()]);
                crypto_op::decrypt(
                    &mut self.engine,
                    AesOpParams {
                        key_slot: channel.key_slot(),
                        iv: &iv,
                        aad: &frame_buf[layout.aad.clone()],
                        input: &frame_buf[layout.data.clone()],
                        output: &mut dst[layout.local_offset..data_end],
                    },
                    &tag,
                )
            }
            MessageClass::Response => {
                if buf.len() > RESP_SIZE_WORDS {
                    return Err(SsitError::FRAME_INVALID_LENGTH);
                }
                // Decrypt into scratch; the caller's buffer is only touched
                // once the tag has verified.
                let mut scratch = [0u32; RESP_SIZE_WORDS];
                crypto_op::decrypt(
                    &mut self.engine,
                    AesOpParams {
                        key_slot: channel.key_slot(),
                        iv: &iv,
                        aad: &frame_buf[layout.aad.clone()],
                        input: &frame_buf[layout.data.clone()],
                        output: scratch.as_mut_bytes(),
                    },
                    &tag,
                )?;
                buf.copy_from_slice(&scratch[..buf.len()]);
                Ok(())
            }
        }
    }
}

/// Inter-die message transport for one die.
///
/// Owns the channel table for every peer; delegates framing and crypto to
/// the configured strategy and raw buffer access to the shared memory and
/// address resolver seams.
pub struct MessageTransport<S, M, B> {
    role: DieRole,
    strategy: S,
    mem: M,
    bufs: B,
    channels: ChannelTable,
}

impl<S, M, B> MessageTransport<S, M, B>
where
    S: ChannelCryptoStrategy,
    M: SharedBufferMem,
    B: BufferAddressResolver,
{
    pub fn new(role: DieRole, strategy: S, mem: M, bufs: B) -> MessageTransport<S, M, B> {
        MessageTransport {
            role,
            strategy,
            mem,
            bufs,
            channels: ChannelTable::new(),
        }
    }

    pub fn role(&self) -> DieRole {
        self.role
    }

    fn channel_index(&self, peer: usize) -> usize {
        match self.role {
            DieRole::Master => peer,
            DieRole::Slave => SLAVE_CHANNEL_INDEX,
        }
    }

    /// Channel state for the given peer (the slave's single master-facing
    /// channel regardless of `peer` when this die is a slave).
    pub fn channel(&self, peer: usize) -> SsitResult<&PeerChannel> {
        self.channels.get(self.channel_index(peer))
    }

    pub fn channel_mut(&mut self, peer: usize) -> SsitResult<&mut PeerChannel> {
        let idx = self.channel_index(peer);
        self.channels.get_mut(idx)
    }

    pub fn strategy_mut(&mut self) -> &mut S {
        &mut self.strategy
    }

    /// Sends the message in `buf` to the given peer, encrypted or in the
    /// clear per the channel state. On failure the peer buffer contents are
    /// undefined.
    pub fn send_message(&mut self, buf: &[u32], peer: usize, is_cfg_cmd: bool) -> SsitResult<()> {
        let addr = self.bufs.send_addr(peer)?;
        // Only requests carry configure-command framing; a response's flag
        // is nulled so it cannot select the first-config path.
        let class = match self.role {
            DieRole::Master => MessageClass::Request,
            DieRole::Slave => MessageClass::Response,
        };
        let is_cfg = is_cfg_cmd && class == MessageClass::Request;
        let idx = self.channel_index(peer);
        let channel = self.channels.get_mut(idx)?;
        self.strategy
            .send(channel, class, is_cfg, buf, &mut self.mem, addr)
            .map_err(|err| {
                cprintln!(
                    "[ssit-comm] send to peer {} failed: {}",
                    peer,
                    HexWord(err.into())
                );
                err
            })
    }

    /// Receives a message from the given peer into `buf`, decrypting and
    /// authenticating it per the channel state. On failure `buf` must be
    /// treated as garbage by the caller.
    pub fn receive_message(
        &mut self,
        buf: &mut [u32],
        peer: usize,
        is_cfg_cmd: bool,
    ) -> SsitResult<()> {
        let addr = self.bufs.recv_addr(peer)?;
        let class = match self.role {
            DieRole::Master => MessageClass::Response,
            DieRole::Slave => MessageClass::Request,
        };
        let is_cfg = is_cfg_cmd && class == MessageClass::Request;
        let idx = self.channel_index(peer);
        let channel = self.channels.get_mut(idx)?;
        self.strategy
            .receive(channel, class, is_cfg, buf, &mut self.mem, addr)
            .map_err(|err| {
                cprintln!(
                    "[ssit-comm] receive from peer {} failed: {}",
                    peer,
                    HexWord(err.into())
                );
                err
            })
    }
}

impl<E, M, B> MessageTransport<AuthenticatedEncryptStrategy<E>, M, B>
where
    E: CryptoEngine,
    M: SharedBufferMem,
    B: BufferAddressResolver,
{
    /// Transport with the authenticated-encryption strategy.
    pub fn with_crypto(role: DieRole, engine: E, mem: M, bufs: B) -> Self {
        MessageTransport::new(role, AuthenticatedEncryptStrategy::new(engine), mem, bufs)
    }
}

impl<M, B> MessageTransport<PlainCopyStrategy, M, B>
where
    M: SharedBufferMem,
    B: BufferAddressResolver,
{
    /// Transport with the copy-through strategy, for packages configured
    /// without secure inter-die communication.
    pub fn plain(role: DieRole, mem: M, bufs: B) -> Self {
        MessageTransport::new(role, PlainCopyStrategy, mem, bufs)
    }
}
