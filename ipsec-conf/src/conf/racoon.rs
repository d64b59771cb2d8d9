// SPDX-License-Identifier: AGPL-3.0-or-later
//! racoon.conf rendering

use crate::config::CryptoConfig;

pub(super) fn write_header(out: &mut String, crypto: &CryptoConfig) {
    out.push_str(&format!(
        "# Racoon IKE daemon configuration file.\n#\n\
         log {};\n\
         path certificate \"{}\";\n\n",
        crypto.log_level, crypto.certificate_path
    ));
}

/// One `remote` block authenticating `peer_name` at `peer_ip` with plain RSA keys
pub(super) fn write_remote(
    out: &mut String,
    host_name: &str,
    peer_ip: &str,
    peer_name: &str,
    crypto: &CryptoConfig,
) {
    out.push_str(&format!(
        "remote {peer_ip}
{{
  exchange_mode {exchange_mode};
  lifetime time {lifetime} hour;
  certificate_type plain_rsa \"{host_name}\";
  peers_certfile plain_rsa \"{peer_name}.pub\";
  verify_cert off;
  proposal {{
    encryption_algorithm {encryption};
    hash_algorithm {hash};
    authentication_method {auth};
    dh_group {dh_group};
  }}
  generate_policy off;
}}

",
        exchange_mode = crypto.exchange_mode,
        lifetime = crypto.lifetime_hours,
        encryption = crypto.encryption_algorithm,
        hash = crypto.hash_algorithm,
        auth = crypto.authentication_method,
        dh_group = crypto.dh_group,
    ));
}

pub(super) fn write_sainfo(out: &mut String, crypto: &CryptoConfig) {
    out.push_str(&format!(
        "sainfo anonymous\n{{\n\
         \tpfs_group {};\n\
         \tencryption_algorithm {};\n\
         \tauthentication_algorithm {};\n\
         \tcompression_algorithm {};\n\
         }}\n",
        crypto.pfs_group,
        crypto.sa_encryption_algorithm,
        crypto.sa_authentication_algorithm,
        crypto.compression_algorithm
    ));
}
