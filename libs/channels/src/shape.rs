use std::fmt;

use constellation_core::ContractDescription;

/// Concrete channel variant a binding can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelShape {
    DuplexSession,
    Duplex,
    OutputSession,
    Output,
    RequestSession,
    Request,
}

impl ChannelShape {
    pub const ALL: [ChannelShape; 6] = [
        ChannelShape::DuplexSession,
        ChannelShape::Duplex,
        ChannelShape::OutputSession,
        ChannelShape::Output,
        ChannelShape::RequestSession,
        ChannelShape::Request,
    ];

    pub fn family(self) -> ShapeFamily {
        match self {
            ChannelShape::DuplexSession | ChannelShape::Duplex => ShapeFamily::Duplex,
            ChannelShape::OutputSession | ChannelShape::Output => ShapeFamily::Output,
            ChannelShape::RequestSession | ChannelShape::Request => ShapeFamily::Request,
        }
    }

    pub fn is_sessioned(self) -> bool {
        matches!(
            self,
            ChannelShape::DuplexSession | ChannelShape::OutputSession | ChannelShape::RequestSession
        )
    }

    /// Whether channels of this shape ever carry messages back to the client
    pub fn can_receive(self) -> bool {
        self.family() != ShapeFamily::Output
    }
}

impl fmt::Display for ChannelShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelShape::DuplexSession => "duplex-session",
            ChannelShape::Duplex => "duplex",
            ChannelShape::OutputSession => "output-session",
            ChannelShape::Output => "output",
            ChannelShape::RequestSession => "request-session",
            ChannelShape::Request => "request",
        };
        f.write_str(name)
    }
}

/// A pair of shapes differing only in session support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeFamily {
    Duplex,
    Output,
    Request,
}

impl ShapeFamily {
    pub fn sessioned(self) -> ChannelShape {
        match self {
            ShapeFamily::Duplex => ChannelShape::DuplexSession,
            ShapeFamily::Output => ChannelShape::OutputSession,
            ShapeFamily::Request => ChannelShape::RequestSession,
        }
    }

    pub fn plain(self) -> ChannelShape {
        match self {
            ShapeFamily::Duplex => ChannelShape::Duplex,
            ShapeFamily::Output => ChannelShape::Output,
            ShapeFamily::Request => ChannelShape::Request,
        }
    }
}

/// Shape facts derived from a contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractShape {
    pub is_duplex: bool,
    pub is_one_way: bool,
}

impl ContractShape {
    /// Classify a contract snapshot
    ///
    /// A contract without operations counts as one-way.
    pub fn classify(contract: &ContractDescription) -> Self {
        Self {
            is_duplex: contract.callback_contract().is_some(),
            is_one_way: contract.operations().iter().all(|op| op.is_one_way()),
        }
    }

    /// Family every candidate shape must come from; duplex wins over one-way
    pub fn family(self) -> ShapeFamily {
        if self.is_duplex {
            ShapeFamily::Duplex
        } else if self.is_one_way {
            ShapeFamily::Output
        } else {
            ShapeFamily::Request
        }
    }
}
