/// Sent by the client before the first frame: "AMQP" 0 0 9 1
pub const PROTOCOL_HEADER: &[u8; 8] = b"AMQP\x00\x00\x09\x01";

#[allow(unused)]
pub mod frames {
    pub const FRAME_METHOD: u8 = 1;
    pub const FRAME_HEADER: u8 = 2;
    pub const FRAME_BODY: u8 = 3;
    pub const FRAME_HEARTBEAT: u8 = 8;
    pub const FRAME_END: u8 = 0xCE;
    pub const FRAME_MIN_SIZE: u32 = 4096;
}

#[allow(unused)]
pub mod classes {
    pub const CLASS_CONNECTION: u16 = 10;
    pub const CLASS_CHANNEL: u16 = 20;
    pub const CLASS_EXCHANGE: u16 = 40;
    pub const CLASS_QUEUE: u16 = 50;
    pub const CLASS_BASIC: u16 = 60;
}

/// Method ids, scoped by class
#[allow(unused)]
pub mod methods {
    pub mod connection {
        pub const START: u16 = 10;
        pub const START_OK: u16 = 11;
        pub const SECURE: u16 = 20;
        pub const SECURE_OK: u16 = 21;
        pub const TUNE: u16 = 30;
        pub const TUNE_OK: u16 = 31;
        pub const OPEN: u16 = 40;
        pub const OPEN_OK: u16 = 41;
        pub const CLOSE: u16 = 50;
        pub const CLOSE_OK: u16 = 51;
        pub const BLOCKED: u16 = 60;
        pub const UNBLOCKED: u16 = 61;
    }

    pub mod channel {
        pub const OPEN: u16 = 10;
        pub const OPEN_OK: u16 = 11;
        pub const FLOW: u16 = 20;
        pub const FLOW_OK: u16 = 21;
        pub const CLOSE: u16 = 40;
        pub const CLOSE_OK: u16 = 41;
    }

    pub mod exchange {
        pub const DECLARE: u16 = 10;
        pub const DECLARE_OK: u16 = 11;
        pub const DELETE: u16 = 20;
        pub const DELETE_OK: u16 = 21;
    }

    pub mod queue {
        pub const DECLARE: u16 = 10;
        pub const DECLARE_OK: u16 = 11;
        pub const BIND: u16 = 20;
        pub const BIND_OK: u16 = 21;
        pub const PURGE: u16 = 30;
        pub const PURGE_OK: u16 = 31;
        pub const DELETE: u16 = 40;
        pub const DELETE_OK: u16 = 41;
    }
}

// reply codes carried by connection.close and channel.close
#[allow(unused)]
pub mod replies {
    pub const REPLY_SUCCESS: u16 = 200;
    pub const CONTENT_TOO_LARGE: u16 = 311;
    pub const NO_ROUTE: u16 = 312;
    pub const NO_CONSUMERS: u16 = 313;
    pub const CONNECTION_FORCED: u16 = 320;
    pub const INVALID_PATH: u16 = 402;
    pub const ACCESS_REFUSED: u16 = 403;
    pub const NOT_FOUND: u16 = 404;
    pub const RESOURCE_LOCKED: u16 = 405;
    pub const PRECONDITION_FAILED: u16 = 406;
    pub const FRAME_ERROR: u16 = 501;
    pub const SYNTAX_ERROR: u16 = 502;
    pub const COMMAND_INVALID: u16 = 503;
    pub const CHANNEL_ERROR: u16 = 504;
    pub const UNEXPECTED_FRAME: u16 = 505;
    pub const RESOURCE_ERROR: u16 = 506;
    pub const NOT_ALLOWED: u16 = 530;
    pub const NOT_IMPLEMENTED: u16 = 540;
    pub const INTERNAL_ERROR: u16 = 541;
}
