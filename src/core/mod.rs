mod transfer_rate;

pub use transfer_rate::TransferRate;
